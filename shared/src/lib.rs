//! Shared types for the canteen ordering service
//!
//! Domain models, the unified error system and small utilities used by
//! the server and by API clients.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
