//! Employee-facing ordering: active menus, submission, own orders

pub mod builder;

use std::collections::HashMap;
use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    ActiveMenu, FoodCategory, FoodItem, Form, MenuDay, Order, OrderSubmission, Profile,
};

use crate::db::{RepoError, Store};
use crate::error::ServiceResult;

pub use builder::{ValidationError, build_order};

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn catalog_for(&self, ids: &[i64]) -> ServiceResult<HashMap<i64, FoodItem>> {
        let items = self.store.find_food_items(ids).await?;
        Ok(items.into_iter().map(|i| (i.id, i)).collect())
    }

    /// Active form of each category with item details, in category order
    pub async fn active_menus(&self, profile: &Profile) -> ServiceResult<Vec<ActiveMenu>> {
        let mut menus = Vec::new();
        for category in FoodCategory::ALL {
            let Some(form) = self.store.find_active_form(category).await? else {
                continue;
            };
            let ids: Vec<i64> = form
                .options
                .iter()
                .flat_map(|o| o.food_item_ids.iter().copied())
                .collect();
            let catalog = self.catalog_for(&ids).await?;
            let submitted = self.store.has_order_for_form(profile.id, form.id).await?;
            menus.push(menu_view(&form, &catalog, submitted));
        }
        Ok(menus)
    }

    /// Validate and persist a weekly order; credits reward coins
    pub async fn submit(
        &self,
        profile: &Profile,
        submission: &OrderSubmission,
    ) -> ServiceResult<Order> {
        let form = self
            .store
            .find_form(submission.form_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::FormNotFound))?;

        if self.store.has_order_for_form(profile.id, form.id).await? {
            return Err(AppError::from(ValidationError::AlreadySubmitted { form_id: form.id }).into());
        }

        let ids: Vec<i64> = submission
            .days
            .iter()
            .flat_map(|d| d.items.iter().map(|i| i.food_item_id))
            .collect();
        let catalog = self.catalog_for(&ids).await?;

        let new_order = build_order(&form, &catalog, submission, profile, shared::util::now_millis())
            .map_err(AppError::from)?;

        let order = match self.store.create_order(&new_order).await {
            Ok(order) => order,
            Err(RepoError::Duplicate(_)) => {
                return Err(
                    AppError::from(ValidationError::AlreadySubmitted { form_id: form.id }).into(),
                );
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            order_id = order.id,
            profile_id = profile.id,
            form_id = form.id,
            total = order.total,
            coins = new_order.coins_awarded,
            "Order submitted"
        );
        Ok(order)
    }

    pub async fn list_own(&self, profile: &Profile) -> ServiceResult<Vec<Order>> {
        Ok(self.store.list_orders_for_profile(profile.id).await?)
    }

    /// Load an order owned by `profile`; other profiles' orders read as missing
    pub async fn find_own(&self, profile: &Profile, order_id: i64) -> ServiceResult<Order> {
        self.store
            .find_order(order_id)
            .await?
            .filter(|o| o.profile_id == profile.id)
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound).into())
    }

    /// Remove an unpaid order of `profile`
    pub async fn delete_own(&self, profile: &Profile, order_id: i64) -> ServiceResult<()> {
        let order = self.find_own(profile, order_id).await?;
        if order.has_payment() {
            return Err(AppError::new(ErrorCode::OrderAlreadyPaid).into());
        }
        match self.store.delete_unpaid_order(order.id).await {
            Ok(()) => {
                tracing::info!(order_id, profile_id = profile.id, "Order deleted");
                Ok(())
            }
            Err(RepoError::NotFound(_)) => Err(AppError::new(ErrorCode::OrderNotFound).into()),
            Err(RepoError::Conflict(_)) => {
                tracing::info!(order_id, "Order delete refused: checkout started");
                Err(AppError::new(ErrorCode::OrderCheckoutPending).into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn menu_view(form: &Form, catalog: &HashMap<i64, FoodItem>, submitted: bool) -> ActiveMenu {
    let days = form
        .options
        .iter()
        .map(|option| {
            let mut items: Vec<FoodItem> = option
                .food_item_ids
                .iter()
                .filter_map(|id| catalog.get(id).cloned())
                .collect();
            items.sort_by(|a, b| a.name.cmp(&b.name));
            MenuDay {
                weekday: option.weekday,
                items,
            }
        })
        .collect();

    ActiveMenu {
        form_id: form.id,
        category: form.category,
        week: form.week.clone(),
        week_period: form.display_week(),
        days,
        submitted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::{
        CatalogStore, CheckoutSession, NewProfile, OrderStore, PaymentStore, ProfileStore,
    };
    use shared::models::{
        DaySelection, FoodItemCreate, FormUpsert, MenuOption, PaymentTarget, SelectionInput,
        Weekday,
    };

    struct Fixture {
        service: OrderService,
        store: Arc<MemoryStore>,
        profile: Profile,
        form: Form,
        rice: FoodItem,
        juice: FoodItem,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let food = |name: &str, price| FoodItemCreate {
            name: name.into(),
            price,
            category: FoodCategory::Lunch,
            image: String::new(),
        };
        let rice = store.create_food_item(&food("Rice Meal", 60)).await.unwrap();
        let juice = store.create_food_item(&food("Juice", 20)).await.unwrap();
        let form = store
            .create_form(
                &FormUpsert {
                    category: FoodCategory::Lunch,
                    week: "2024-W01".into(),
                    active: true,
                    options: vec![MenuOption {
                        weekday: Weekday::Monday,
                        food_item_ids: vec![rice.id, juice.id],
                    }],
                },
                0,
            )
            .await
            .unwrap();
        let profile = store
            .create_profile(&NewProfile {
                email: "ana@example.com".into(),
                name: "Ana".into(),
                role: None,
                department: None,
                coins: 50,
                is_admin: false,
                created_at: 0,
            })
            .await
            .unwrap();
        Fixture {
            service: OrderService::new(store.clone()),
            store,
            profile,
            form,
            rice,
            juice,
        }
    }

    fn monday(items: &[(i64, i64)]) -> Vec<DaySelection> {
        vec![DaySelection {
            weekday: Weekday::Monday,
            items: items
                .iter()
                .map(|&(food_item_id, quantity)| SelectionInput {
                    food_item_id,
                    quantity,
                })
                .collect(),
        }]
    }

    #[tokio::test]
    async fn test_submit_persists_total_and_coins() {
        let f = fixture().await;
        let submission = OrderSubmission {
            form_id: f.form.id,
            days: monday(&[(f.rice.id, 1), (f.juice.id, 2)]),
        };
        let order = f.service.submit(&f.profile, &submission).await.unwrap();

        assert_eq!(order.total, 100);
        assert_eq!(order.computed_total(), order.total);
        let profile = f.store.find_profile(f.profile.id).await.unwrap().unwrap();
        assert_eq!(profile.coins, 90);

        let menus = f.service.active_menus(&f.profile).await.unwrap();
        assert_eq!(menus.len(), 1);
        assert!(menus[0].submitted);
        assert_eq!(menus[0].days[0].items[0].name, "Juice");
    }

    #[tokio::test]
    async fn test_second_submission_rejected() {
        let f = fixture().await;
        let submission = OrderSubmission {
            form_id: f.form.id,
            days: monday(&[(f.rice.id, 1)]),
        };
        f.service.submit(&f.profile, &submission).await.unwrap();

        let err: AppError = f
            .service
            .submit(&f.profile, &submission)
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::OrderAlreadySubmitted);
    }

    #[tokio::test]
    async fn test_rejected_submission_creates_nothing() {
        let f = fixture().await;
        let submission = OrderSubmission {
            form_id: f.form.id,
            days: monday(&[(f.rice.id, 1), (9999, 1)]),
        };
        let err: AppError = f
            .service
            .submit(&f.profile, &submission)
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::ItemNotOffered);
        assert!(f.service.list_own(&f.profile).await.unwrap().is_empty());
        let profile = f.store.find_profile(f.profile.id).await.unwrap().unwrap();
        assert_eq!(profile.coins, 50);
    }

    #[tokio::test]
    async fn test_delete_own_unpaid_only() {
        let f = fixture().await;
        let submission = OrderSubmission {
            form_id: f.form.id,
            days: monday(&[(f.rice.id, 1)]),
        };
        let order = f.service.submit(&f.profile, &submission).await.unwrap();

        let stranger = Profile {
            id: f.profile.id + 100,
            ..f.profile.clone()
        };
        let err: AppError = f
            .service
            .delete_own(&stranger, order.id)
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::OrderNotFound);

        f.store.mark_orders_paid(&[order.id]).await.unwrap();
        let err: AppError = f
            .service
            .delete_own(&f.profile, order.id)
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::OrderAlreadyPaid);
    }

    #[tokio::test]
    async fn test_delete_blocked_once_checkout_started() {
        let f = fixture().await;
        let submission = OrderSubmission {
            form_id: f.form.id,
            days: monday(&[(f.rice.id, 1)]),
        };
        let order = f.service.submit(&f.profile, &submission).await.unwrap();
        f.store
            .record_checkout_session(&CheckoutSession {
                id: "cs_test_1".into(),
                target: PaymentTarget::Order(order.id),
                order_id: order.id,
                amount: 60,
                service_fee: 150,
                created_at: 0,
            })
            .await
            .unwrap();

        let err: AppError = f
            .service
            .delete_own(&f.profile, order.id)
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::OrderCheckoutPending);
        assert!(f.store.find_order(order.id).await.unwrap().is_some());
        assert!(
            f.store
                .find_checkout_session("cs_test_1")
                .await
                .unwrap()
                .is_some()
        );
    }
}
