//! Fixed-window limit on the sign-in routes, keyed by client address
//!
//! The client is the TCP peer. `X-Forwarded-For` is only read when the
//! server is configured to sit behind a trusted reverse proxy.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use shared::error::{AppError, ErrorCode};

use crate::state::AppState;

/// Sign-in attempts per client and window
const SIGN_IN_BUDGET: u32 = 10;
const SIGN_IN_WINDOW: Duration = Duration::from_secs(60);
/// Windows untouched this long are dropped by [`RateLimiter::prune`]
const IDLE_EXPIRY: Duration = Duration::from_secs(300);

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Clone, Copy)]
struct Window {
    opened: Instant,
    hits: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
    budget: u32,
    period: Duration,
    trust_forwarded_for: bool,
}

impl RateLimiter {
    pub fn new(trust_forwarded_for: bool) -> Self {
        Self::with_budget(SIGN_IN_BUDGET, SIGN_IN_WINDOW, trust_forwarded_for)
    }

    fn with_budget(budget: u32, period: Duration, trust_forwarded_for: bool) -> Self {
        Self {
            windows: Arc::default(),
            budget,
            period,
            trust_forwarded_for,
        }
    }

    /// Address the budget is charged to.
    ///
    /// Behind a trusted proxy this is the last `X-Forwarded-For` hop, the one
    /// the proxy appended itself. Requests without a peer (in-process
    /// callers) share the unspecified address.
    fn client_of(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> IpAddr {
        if self.trust_forwarded_for
            && let Some(hop) = headers
                .get(FORWARDED_FOR)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.rsplit(',').next())
                .and_then(|hop| hop.trim().parse::<IpAddr>().ok())
        {
            return hop;
        }
        peer.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    fn admit(&self, client: IpAddr) -> bool {
        self.admit_at(client, Instant::now())
    }

    /// Count one hit; `false` once the current window's budget is spent
    fn admit_at(&self, client: IpAddr, now: Instant) -> bool {
        let mut windows = self.windows.lock();
        let window = windows.entry(client).or_insert(Window {
            opened: now,
            hits: 0,
        });
        if now.saturating_duration_since(window.opened) >= self.period {
            *window = Window {
                opened: now,
                hits: 0,
            };
        }
        window.hits = window.hits.saturating_add(1);
        window.hits <= self.budget
    }

    pub fn prune(&self) {
        self.prune_at(Instant::now());
    }

    fn prune_at(&self, now: Instant) {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.opened) < IDLE_EXPIRY);
        let dropped = before - windows.len();
        if dropped > 0 {
            tracing::debug!(dropped, "Pruned idle sign-in windows");
        }
    }
}

/// Middleware for `/login` and `/callback`; both share one budget per client
pub async fn sign_in_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let limiter = &state.rate_limiter;
    let client = limiter.client_of(request.headers(), peer);
    if !limiter.admit(client) {
        tracing::warn!(%client, path = %request.uri().path(), "Sign-in rate limit exceeded");
        return AppError::new(ErrorCode::TooManyAttempts).into_response();
    }
    next.run(request).await
}
