//! Application state shared by every handler

use std::sync::Arc;

use crate::auth::RateLimiter;
use crate::catalog::CatalogService;
use crate::config::{Config, StoreBackend};
use crate::db::Store;
use crate::db::memory::MemoryStore;
use crate::db::postgres::PgStore;
use crate::identity::{IdentityProvider, IdentityService, MicrosoftIdentity};
use crate::orders::OrderService;
use crate::payment::{PayMongoClient, PaymentGateway, PaymentService};
use crate::reports::ReportService;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend (PostgreSQL or in-memory)
    pub store: Arc<dyn Store>,
    pub identity: IdentityService,
    pub catalog: CatalogService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub reports: ReportService,
    /// JWT secret for session tokens
    pub jwt_secret: String,
    /// Rate limiter for the sign-in routes
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Connect the configured store and the outbound integrations
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let store: Arc<dyn Store> = match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or("DATABASE_URL must be set")?;
                Arc::new(PgStore::connect(url).await?)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let provider = Arc::new(MicrosoftIdentity::new(config)?);
        let gateway = Arc::new(PayMongoClient::new(config)?);

        Ok(Self::from_parts(config, store, provider, gateway))
    }

    /// Assemble services over already-built dependencies
    pub fn from_parts(
        config: &Config,
        store: Arc<dyn Store>,
        provider: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            identity: IdentityService::new(
                provider,
                store.clone(),
                &config.allowed_email_domain,
                &config.admin_emails,
            ),
            catalog: CatalogService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            payments: PaymentService::new(gateway, store.clone(), config),
            reports: ReportService::new(store.clone()),
            store,
            jwt_secret: config.jwt_secret.clone(),
            rate_limiter: RateLimiter::new(config.trust_forwarded_for),
        }
    }
}
