//! PostgreSQL store
//!
//! Runtime-checked sqlx queries against the schema in `migrations/`.
//! Each table family lives in its own module as free functions over
//! `&PgPool`; [`PgStore`] wires them to the store traits.

mod catalog;
mod forms;
mod orders;
mod payments;
mod profiles;

use async_trait::async_trait;
use shared::models::{
    FoodCategory, FoodItem, FoodItemCreate, FoodItemUpdate, Form, FormSummary, FormUpsert, Order,
    OrderQuery, Profile, ProfileSummary, Weekday,
};
use sqlx::PgPool;

use super::{
    CatalogStore, CheckoutSession, NewOrder, NewProfile, OrderStore, PaymentStore, ProfileStore,
    RepoError, RepoResult, ReservationPaid,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply pending migrations
    pub async fn connect(database_url: &str) -> Result<Self, BoxError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

fn weekday(value: i16) -> RepoResult<Weekday> {
    Weekday::from_db(value).ok_or_else(|| RepoError::Database(format!("invalid weekday {value}")))
}

fn category(value: &str) -> RepoResult<FoodCategory> {
    FoodCategory::from_db(value)
        .ok_or_else(|| RepoError::Database(format!("invalid food category {value}")))
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_food_items(&self, category: Option<FoodCategory>) -> RepoResult<Vec<FoodItem>> {
        catalog::list(&self.pool, category).await
    }

    async fn find_food_items(&self, ids: &[i64]) -> RepoResult<Vec<FoodItem>> {
        catalog::find_many(&self.pool, ids).await
    }

    async fn create_food_item(&self, data: &FoodItemCreate) -> RepoResult<FoodItem> {
        catalog::create(&self.pool, data).await
    }

    async fn update_food_item(&self, id: i64, data: &FoodItemUpdate) -> RepoResult<FoodItem> {
        catalog::update(&self.pool, id, data).await
    }

    async fn delete_food_item(&self, id: i64) -> RepoResult<()> {
        catalog::delete(&self.pool, id).await
    }

    async fn list_forms(&self) -> RepoResult<Vec<FormSummary>> {
        forms::list(&self.pool).await
    }

    async fn find_form(&self, id: i64) -> RepoResult<Option<Form>> {
        forms::find(&self.pool, id).await
    }

    async fn find_active_form(&self, category: FoodCategory) -> RepoResult<Option<Form>> {
        forms::find_active(&self.pool, category).await
    }

    async fn create_form(&self, data: &FormUpsert, now: i64) -> RepoResult<Form> {
        forms::create(&self.pool, data, now).await
    }

    async fn replace_form(&self, id: i64, data: &FormUpsert) -> RepoResult<Form> {
        forms::replace(&self.pool, id, data).await
    }

    async fn set_form_active(&self, id: i64, active: bool) -> RepoResult<Form> {
        forms::set_active(&self.pool, id, active).await
    }

    async fn delete_form(&self, id: i64) -> RepoResult<()> {
        forms::delete(&self.pool, id).await
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn find_profile(&self, id: i64) -> RepoResult<Option<Profile>> {
        profiles::find(&self.pool, id).await
    }

    async fn find_profile_by_email(&self, email: &str) -> RepoResult<Option<Profile>> {
        profiles::find_by_email(&self.pool, email).await
    }

    async fn create_profile(&self, data: &NewProfile) -> RepoResult<Profile> {
        profiles::create(&self.pool, data).await
    }

    async fn list_profiles(&self) -> RepoResult<Vec<ProfileSummary>> {
        profiles::list(&self.pool).await
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(&self, data: &NewOrder) -> RepoResult<Order> {
        orders::create(&self.pool, data).await
    }

    async fn find_order(&self, id: i64) -> RepoResult<Option<Order>> {
        orders::find(&self.pool, id).await
    }

    async fn find_order_by_reservation(&self, reservation_id: i64) -> RepoResult<Option<Order>> {
        orders::find_by_reservation(&self.pool, reservation_id).await
    }

    async fn find_orders(&self, ids: &[i64]) -> RepoResult<Vec<Order>> {
        orders::find_many(&self.pool, ids).await
    }

    async fn list_orders_for_profile(&self, profile_id: i64) -> RepoResult<Vec<Order>> {
        orders::list_for_profile(&self.pool, profile_id).await
    }

    async fn has_order_for_form(&self, profile_id: i64, form_id: i64) -> RepoResult<bool> {
        orders::exists_for_form(&self.pool, profile_id, form_id).await
    }

    async fn list_orders(&self, query: &OrderQuery) -> RepoResult<Vec<Order>> {
        orders::list(&self.pool, query).await
    }

    async fn delete_unpaid_order(&self, id: i64) -> RepoResult<()> {
        orders::delete_unpaid(&self.pool, id).await
    }

    async fn mark_orders_paid(&self, ids: &[i64]) -> RepoResult<u64> {
        orders::mark_paid(&self.pool, ids).await
    }

    async fn mark_reservation_paid(&self, reservation_id: i64) -> RepoResult<ReservationPaid> {
        orders::mark_reservation_paid(&self.pool, reservation_id).await
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn record_checkout_session(&self, session: &CheckoutSession) -> RepoResult<()> {
        payments::record_session(&self.pool, session).await
    }

    async fn find_checkout_session(&self, id: &str) -> RepoResult<Option<CheckoutSession>> {
        payments::find_session(&self.pool, id).await
    }

    async fn record_webhook_event(
        &self,
        event_id: &str,
        event_type: &str,
        now: i64,
    ) -> RepoResult<bool> {
        payments::record_event(&self.pool, event_id, event_type, now).await
    }
}
