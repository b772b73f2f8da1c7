//! Organizational sign-in
//!
//! The provider turns an authorization code into a directory user; the
//! service enforces the email domain and maps the user onto a profile,
//! creating it on first login.

pub mod microsoft;

use std::sync::Arc;

use async_trait::async_trait;
use shared::error::{AppError, ErrorCode};
use shared::models::Profile;
use thiserror::Error;

use crate::db::{NewProfile, RepoError, Store};
use crate::error::ServiceError;

pub use microsoft::MicrosoftIdentity;

/// Coins granted to a new profile
pub const WELCOME_COINS: i64 = 50;

#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// The provider redirected back without a code
    #[error("authorization was not granted: {0}")]
    Denied(String),

    #[error("identity provider request failed: {0}")]
    Provider(String),

    #[error("identity provider returned no email address")]
    MissingEmail,

    #[error("email domain not allowed: {email}")]
    DomainNotAllowed { email: String },

    #[error(transparent)]
    Store(#[from] RepoError),
}

impl From<AuthorizationError> for ServiceError {
    fn from(err: AuthorizationError) -> Self {
        match err {
            AuthorizationError::Store(e) => ServiceError::Repo(e),
            AuthorizationError::Denied(_) | AuthorizationError::Provider(_) => {
                ServiceError::App(AppError::new(ErrorCode::AuthorizationFailed))
            }
            AuthorizationError::MissingEmail => {
                ServiceError::App(AppError::new(ErrorCode::EmailMissing))
            }
            AuthorizationError::DomainNotAllowed { .. } => {
                ServiceError::App(AppError::new(ErrorCode::EmailDomainNotAllowed))
            }
        }
    }
}

/// User as reported by the directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryUser {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
}

/// OAuth2 authorization-code provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to sign in
    fn authorization_url(&self, state: &str) -> Result<String, AuthorizationError>;

    /// Redeem the authorization code and fetch the signed-in user
    async fn exchange_code(&self, code: &str) -> Result<DirectoryUser, AuthorizationError>;
}

/// `true` when `email` is `local@domain` with exactly the given domain
pub fn email_in_domain(email: &str, domain: &str) -> bool {
    match email.rsplit_once('@') {
        Some((local, host)) => {
            !local.is_empty() && !domain.is_empty() && host.eq_ignore_ascii_case(domain)
        }
        None => false,
    }
}

#[derive(Clone)]
pub struct IdentityService {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn Store>,
    allowed_domain: String,
    admin_emails: Arc<Vec<String>>,
}

impl IdentityService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn Store>,
        allowed_domain: &str,
        admin_emails: &[String],
    ) -> Self {
        Self {
            provider,
            store,
            allowed_domain: allowed_domain.trim().to_lowercase(),
            admin_emails: Arc::new(admin_emails.to_vec()),
        }
    }

    /// Provider sign-in URL with a fresh `state`
    pub fn login_url(&self) -> Result<String, AuthorizationError> {
        let state = uuid::Uuid::new_v4().simple().to_string();
        self.provider.authorization_url(&state)
    }

    /// Complete a login: domain check, then get-or-create the profile.
    ///
    /// Nothing is written when the domain check fails.
    pub async fn authenticate(&self, code: &str) -> Result<Profile, AuthorizationError> {
        let user = self.provider.exchange_code(code).await?;

        let email = user
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or(AuthorizationError::MissingEmail)?;

        if !email_in_domain(&email, &self.allowed_domain) {
            tracing::warn!(email = %email, "Login rejected: email domain not allowed");
            return Err(AuthorizationError::DomainNotAllowed { email });
        }

        if let Some(profile) = self.store.find_profile_by_email(&email).await? {
            tracing::info!(profile_id = profile.id, "Login");
            return Ok(profile);
        }

        let name = user
            .display_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        let new_profile = NewProfile {
            is_admin: self.admin_emails.contains(&email),
            email,
            name,
            role: user.job_title,
            department: user.department,
            coins: WELCOME_COINS,
            created_at: shared::util::now_millis(),
        };

        match self.store.create_profile(&new_profile).await {
            Ok(profile) => {
                tracing::info!(
                    profile_id = profile.id,
                    is_admin = profile.is_admin,
                    "Profile created on first login"
                );
                Ok(profile)
            }
            // Concurrent first login for the same account
            Err(RepoError::Duplicate(_)) => self
                .store
                .find_profile_by_email(&new_profile.email)
                .await?
                .ok_or_else(|| RepoError::NotFound(format!("profile {}", new_profile.email)).into()),
            Err(e) => Err(e.into()),
        }
    }
}
