//! canteen-server: weekly cafeteria ordering service
//!
//! Long-running service that:
//! - Signs employees in through the organization's Microsoft tenant
//! - Serves the active weekly menus and accepts one order per form
//! - Creates PayMongo checkouts and applies signed payment webhooks
//! - Gives administrators the catalog, forms and kitchen reports

mod api;
mod auth;
mod catalog;
mod config;
mod db;
mod error;
mod identity;
mod orders;
mod payment;
mod reports;
mod state;

use std::net::SocketAddr;

use config::Config;
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canteen_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!(
        env = %config.environment,
        store = ?config.store,
        domain = %config.allowed_email_domain,
        trust_forwarded_for = config.trust_forwarded_for,
        "Starting canteen-server"
    );

    let state = AppState::new(&config).await?;
    let app = api::create_router(state.clone());

    // Drop idle sign-in rate limit windows every 5 minutes
    let rate_limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.prune();
        }
    });

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("canteen-server HTTP listening on {http_addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
