//! Persistence layer
//!
//! Handlers and services only see the [`Store`] trait object. Two
//! implementations exist: [`postgres::PgStore`] (sqlx) and
//! [`memory::MemoryStore`] (tests and `STORE=memory`). Every multi-row write
//! is atomic in both, and paid flags only move from `false` to `true`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use shared::models::{
    FoodCategory, FoodItem, FoodItemCreate, FoodItemUpdate, Form, FormSummary, FormUpsert, Order,
    OrderQuery, PaymentTarget, Profile, ProfileSummary, Selection, Weekday,
};
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Rejected because other rows still depend on the target
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            return RepoError::Duplicate(db_err.message().to_string());
        }
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Profile row to insert on first login
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub email: String,
    pub name: String,
    pub role: Option<String>,
    pub department: Option<String>,
    pub coins: i64,
    pub is_admin: bool,
    pub created_at: i64,
}

/// One weekday of a validated order
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub weekday: Weekday,
    pub selections: Vec<Selection>,
}

/// Validated order, ready to persist
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub profile_id: i64,
    pub form_id: i64,
    pub name: String,
    pub grade: String,
    pub total: i64,
    /// Coins credited to the profile together with the insert
    pub coins_awarded: i64,
    pub created_at: i64,
    pub reservations: Vec<NewReservation>,
}

/// Gateway checkout session linked to what it pays for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Gateway-assigned session id
    pub id: String,
    pub target: PaymentTarget,
    /// Owning order, also for reservation targets
    pub order_id: i64,
    pub amount: i64,
    pub service_fee: i64,
    pub created_at: i64,
}

/// Outcome of a reservation compare-and-set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationPaid {
    /// The reservation flipped from unpaid to paid in this call
    pub changed: bool,
    /// The owning order is paid after this call
    pub order_paid: bool,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_food_items(&self, category: Option<FoodCategory>) -> RepoResult<Vec<FoodItem>>;
    /// Items among `ids`; missing ids are simply absent
    async fn find_food_items(&self, ids: &[i64]) -> RepoResult<Vec<FoodItem>>;
    async fn create_food_item(&self, data: &FoodItemCreate) -> RepoResult<FoodItem>;
    /// `Conflict` when the category changes while a menu option offers the item
    async fn update_food_item(&self, id: i64, data: &FoodItemUpdate) -> RepoResult<FoodItem>;
    /// `Conflict` while a menu option or selection references the item
    async fn delete_food_item(&self, id: i64) -> RepoResult<()>;

    async fn list_forms(&self) -> RepoResult<Vec<FormSummary>>;
    async fn find_form(&self, id: i64) -> RepoResult<Option<Form>>;
    async fn find_active_form(&self, category: FoodCategory) -> RepoResult<Option<Form>>;
    /// An active form deactivates the other forms of its category
    async fn create_form(&self, data: &FormUpsert, now: i64) -> RepoResult<Form>;
    /// Replaces category, week, active flag and the whole option set.
    /// `Conflict` when orders exist and anything but the active flag changes.
    async fn replace_form(&self, id: i64, data: &FormUpsert) -> RepoResult<Form>;
    async fn set_form_active(&self, id: i64, active: bool) -> RepoResult<Form>;
    /// `Conflict` while orders exist for the form
    async fn delete_form(&self, id: i64) -> RepoResult<()>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(&self, id: i64) -> RepoResult<Option<Profile>>;
    async fn find_profile_by_email(&self, email: &str) -> RepoResult<Option<Profile>>;
    /// `Duplicate` when the email already has a profile
    async fn create_profile(&self, data: &NewProfile) -> RepoResult<Profile>;
    async fn list_profiles(&self) -> RepoResult<Vec<ProfileSummary>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts the order tree and credits coins. `Duplicate` when the
    /// profile already ordered on the form.
    async fn create_order(&self, data: &NewOrder) -> RepoResult<Order>;
    async fn find_order(&self, id: i64) -> RepoResult<Option<Order>>;
    async fn find_order_by_reservation(&self, reservation_id: i64) -> RepoResult<Option<Order>>;
    /// Orders among `ids`, ascending by id
    async fn find_orders(&self, ids: &[i64]) -> RepoResult<Vec<Order>>;
    /// Newest first
    async fn list_orders_for_profile(&self, profile_id: i64) -> RepoResult<Vec<Order>>;
    async fn has_order_for_form(&self, profile_id: i64, form_id: i64) -> RepoResult<bool>;
    /// Newest first
    async fn list_orders(&self, query: &OrderQuery) -> RepoResult<Vec<Order>>;
    /// `Conflict` when the order or any reservation is paid, or a checkout
    /// session was recorded for it
    async fn delete_unpaid_order(&self, id: i64) -> RepoResult<()>;
    /// Compare-and-set on each order and its reservations; returns how many
    /// orders flipped
    async fn mark_orders_paid(&self, ids: &[i64]) -> RepoResult<u64>;
    /// Compare-and-set on the reservation, then on the order once every
    /// reservation is paid
    async fn mark_reservation_paid(&self, reservation_id: i64) -> RepoResult<ReservationPaid>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn record_checkout_session(&self, session: &CheckoutSession) -> RepoResult<()>;
    async fn find_checkout_session(&self, id: &str) -> RepoResult<Option<CheckoutSession>>;
    /// Returns `false` when the event id was already recorded
    async fn record_webhook_event(
        &self,
        event_id: &str,
        event_type: &str,
        now: i64,
    ) -> RepoResult<bool>;
}

/// Everything the service needs from persistence
pub trait Store: CatalogStore + ProfileStore + OrderStore + PaymentStore {}

impl<T> Store for T where T: CatalogStore + ProfileStore + OrderStore + PaymentStore {}
