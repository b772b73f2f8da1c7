//! Data models
//!
//! Shared between the server and API clients. All IDs are `i64`,
//! timestamps are Unix milliseconds, money is whole pesos.

pub mod admin;
pub mod catalog;
pub mod form;
pub mod order;
pub mod profile;
pub mod report;

// Re-exports
pub use admin::*;
pub use catalog::*;
pub use form::*;
pub use order::*;
pub use profile::*;
pub use report::*;
