//! Server configuration

use rust_decimal::Decimal;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Persistence backend selected by `STORE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL (unused with the memory store)
    pub database_url: Option<String>,
    pub store: StoreBackend,
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Public base URL; OAuth redirect and checkout success target
    pub host_url: String,
    /// Only accounts of this email domain may sign in
    pub allowed_email_domain: String,
    /// Lowercased emails granted the admin flag on first login
    pub admin_emails: Vec<String>,
    pub microsoft_client_id: String,
    pub microsoft_client_secret: String,
    /// e.g. https://login.microsoftonline.com/organizations
    pub microsoft_authority_url: String,
    pub microsoft_graph_url: String,
    pub paymongo_secret_key: String,
    pub paymongo_webhook_secret: String,
    pub paymongo_api_url: String,
    /// Fraction of the amount charged as the service fee
    pub service_fee_rate: Decimal,
    /// JWT secret for session tokens
    pub jwt_secret: String,
    /// Timeout for outbound HTTP calls
    pub http_timeout_secs: u64,
    /// Read the client address from `X-Forwarded-For` (only behind a trusted proxy)
    pub trust_forwarded_for: bool,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let store = match std::env::var("STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("postgres") | Err(_) => StoreBackend::Postgres,
            Ok(other) => return Err(format!("unknown STORE backend: {other}").into()),
        };
        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if store == StoreBackend::Postgres && database_url.is_none() {
            return Err("DATABASE_URL must be set".into());
        }

        let service_fee_rate = match std::env::var("SERVICE_FEE_RATE") {
            Ok(raw) => raw
                .trim()
                .parse::<Decimal>()
                .map_err(|e| format!("invalid SERVICE_FEE_RATE {raw:?}: {e}"))?,
            Err(_) => Decimal::new(25, 3),
        };
        if service_fee_rate.is_sign_negative() {
            return Err("SERVICE_FEE_RATE must not be negative".into());
        }

        Ok(Self {
            database_url,
            store,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: environment.clone(),
            host_url: std::env::var("HOST_URL").unwrap_or_else(|_| "http://localhost:8080".into()),
            allowed_email_domain: std::env::var("ALLOWED_EMAIL_DOMAIN")
                .unwrap_or_else(|_| "cclcentrex.edu.ph".into())
                .trim()
                .to_lowercase(),
            admin_emails: parse_email_list(&std::env::var("ADMIN_EMAILS").unwrap_or_default()),
            microsoft_client_id: Self::require_secret("MICROSOFT_CLIENT_ID", &environment)?,
            microsoft_client_secret: Self::require_secret("MICROSOFT_CLIENT_SECRET", &environment)?,
            microsoft_authority_url: std::env::var("MICROSOFT_AUTHORITY_URL")
                .unwrap_or_else(|_| "https://login.microsoftonline.com/organizations".into()),
            microsoft_graph_url: std::env::var("MICROSOFT_GRAPH_URL")
                .unwrap_or_else(|_| "https://graph.microsoft.com/v1.0".into()),
            paymongo_secret_key: Self::require_secret("PAYMONGO_SECRET_KEY", &environment)?,
            paymongo_webhook_secret: Self::require_secret("PAYMONGO_WEBHOOK_SECRET", &environment)?,
            paymongo_api_url: std::env::var("PAYMONGO_API_URL")
                .unwrap_or_else(|_| "https://api.paymongo.com".into()),
            service_fee_rate,
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(15),
            trust_forwarded_for: parse_flag(
                &std::env::var("TRUST_FORWARDED_FOR").unwrap_or_default(),
            ),
        })
    }

    /// OAuth redirect target registered with the identity provider
    pub fn redirect_uri(&self) -> String {
        format!("{}/callback", self.host_url.trim_end_matches('/'))
    }

    /// Memory-backed configuration with every outbound URL at `base_url`
    #[cfg(test)]
    pub(crate) fn for_tests(base_url: &str) -> Self {
        Self {
            database_url: None,
            store: StoreBackend::Memory,
            http_port: 0,
            environment: "development".into(),
            host_url: "http://localhost:8080".into(),
            allowed_email_domain: "school.edu.ph".into(),
            admin_emails: vec!["head@school.edu.ph".into()],
            microsoft_client_id: "client-id".into(),
            microsoft_client_secret: "client-secret".into(),
            microsoft_authority_url: base_url.into(),
            microsoft_graph_url: base_url.into(),
            paymongo_secret_key: "sk_test_key".into(),
            paymongo_webhook_secret: "whsk_test_secret".into(),
            paymongo_api_url: base_url.into(),
            service_fee_rate: Decimal::new(25, 3),
            jwt_secret: "test-jwt-secret".into(),
            http_timeout_secs: 5,
            trust_forwarded_for: false,
        }
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
