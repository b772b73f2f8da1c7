//! Microsoft identity platform (OAuth2 authorization code) + Graph `/me`

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{AuthorizationError, DirectoryUser, IdentityProvider};
use crate::config::Config;

pub const SCOPES: &[&str] = &["User.Read", "profile", "email", "openid"];

const ME_SELECT: &str = "displayName,givenName,jobTitle,mail,department,id,userPrincipalName";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    display_name: Option<String>,
    mail: Option<String>,
    user_principal_name: Option<String>,
    job_title: Option<String>,
    department: Option<String>,
}

impl From<GraphUser> for DirectoryUser {
    fn from(user: GraphUser) -> Self {
        DirectoryUser {
            email: user.mail.or(user.user_principal_name),
            display_name: user.display_name,
            job_title: user.job_title,
            department: user.department,
        }
    }
}

pub struct MicrosoftIdentity {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authority_url: String,
    graph_url: String,
}

impl MicrosoftIdentity {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            client_id: config.microsoft_client_id.clone(),
            client_secret: config.microsoft_client_secret.clone(),
            redirect_uri: config.redirect_uri(),
            authority_url: config.microsoft_authority_url.trim_end_matches('/').to_string(),
            graph_url: config.microsoft_graph_url.trim_end_matches('/').to_string(),
        })
    }

    fn provider_error(context: &str, e: impl std::fmt::Display) -> AuthorizationError {
        AuthorizationError::Provider(format!("{context}: {e}"))
    }
}

#[async_trait]
impl IdentityProvider for MicrosoftIdentity {
    fn authorization_url(&self, state: &str) -> Result<String, AuthorizationError> {
        let scope = SCOPES.join(" ");
        let url = reqwest::Url::parse_with_params(
            &format!("{}/oauth2/v2.0/authorize", self.authority_url),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_mode", "query"),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| Self::provider_error("invalid authority URL", e))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<DirectoryUser, AuthorizationError> {
        let scope = SCOPES.join(" ");
        let resp = self
            .http
            .post(format!("{}/oauth2/v2.0/token", self.authority_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Self::provider_error("token request failed", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Token endpoint rejected authorization code");
            return Err(AuthorizationError::Provider(format!(
                "token endpoint returned {status}"
            )));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Self::provider_error("malformed token response", e))?;

        let resp = self
            .http
            .get(format!("{}/me", self.graph_url))
            .query(&[("$select", ME_SELECT)])
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| Self::provider_error("graph request failed", e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AuthorizationError::Provider(format!(
                "graph endpoint returned {status}"
            )));
        }
        let user: GraphUser = resp
            .json()
            .await
            .map_err(|e| Self::provider_error("malformed graph response", e))?;

        Ok(user.into())
    }
}
