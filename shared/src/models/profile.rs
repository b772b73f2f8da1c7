//! Employee profile model

use serde::{Deserialize, Serialize};

/// Profile entity, one per organizational account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    /// Lowercased organizational email (unique)
    pub email: String,
    pub name: String,
    /// Job title from the directory
    pub role: Option<String>,
    pub department: Option<String>,
    /// Reward coin balance
    pub coins: i64,
    pub is_admin: bool,
    pub created_at: i64,
}

/// Admin listing row with order counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSummary {
    #[serde(flatten)]
    pub profile: Profile,
    pub total_orders: i64,
    pub unpaid_orders: i64,
}

/// Successful sign-in: session token plus the caller's profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub profile: Profile,
}
