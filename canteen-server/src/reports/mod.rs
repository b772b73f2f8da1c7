//! Kitchen preparation reports and admin bulk actions
//!
//! Reports are pure reads over persisted orders. A reservation counts as
//! paid when it or its order is paid.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    AdminAction, AdminActionOutcome, DayQuantities, DaySheet, FoodItem, Form, ItemQuantity,
    KitchenSheet, Order, OrderQuery, OrderSlip, QuantityReport, ReportFilter, SlipLine, Weekday,
};

use crate::db::Store;
use crate::error::ServiceResult;

/// Zero-quantity rows a report always shows: `(weekday, food item id, name)`
pub type ReportSeed = Vec<(Weekday, i64, String)>;

/// Every item offered by `form`, named from `catalog` when known
pub fn seed_from_form(form: &Form, catalog: &HashMap<i64, FoodItem>) -> ReportSeed {
    form.options
        .iter()
        .flat_map(|option| {
            option.food_item_ids.iter().filter_map(move |id| {
                catalog
                    .get(id)
                    .map(|item| (option.weekday, *id, item.name.clone()))
            })
        })
        .collect()
}

fn sorted_items(items: BTreeMap<i64, (String, i64)>) -> Vec<ItemQuantity> {
    let mut items: Vec<ItemQuantity> = items
        .into_iter()
        .map(|(food_item_id, (name, quantity))| ItemQuantity {
            food_item_id,
            name,
            quantity,
        })
        .collect();
    items.sort_by(|a, b| a.name.cmp(&b.name).then(a.food_item_id.cmp(&b.food_item_id)));
    items
}

/// Quantity per (weekday, food item) plus per-item totals
pub fn quantity_report(
    seed: &[(Weekday, i64, String)],
    orders: &[Order],
    filter: ReportFilter,
) -> QuantityReport {
    let mut days: BTreeMap<Weekday, BTreeMap<i64, (String, i64)>> =
        Weekday::ALL.iter().map(|d| (*d, BTreeMap::new())).collect();

    for (weekday, id, name) in seed {
        days.entry(*weekday)
            .or_default()
            .entry(*id)
            .or_insert_with(|| (name.clone(), 0));
    }

    for order in orders {
        for reservation in &order.reservations {
            if !filter.includes(order.paid || reservation.paid) {
                continue;
            }
            let day = days.entry(reservation.weekday).or_default();
            for selection in &reservation.selections {
                day.entry(selection.food_item_id)
                    .or_insert_with(|| (selection.food_item_name.clone(), 0))
                    .1 += selection.quantity;
            }
        }
    }

    let mut totals: BTreeMap<i64, (String, i64)> = BTreeMap::new();
    for items in days.values() {
        for (id, (name, quantity)) in items {
            totals.entry(*id).or_insert_with(|| (name.clone(), 0)).1 += quantity;
        }
    }

    QuantityReport {
        filter,
        days: days
            .into_iter()
            .map(|(weekday, items)| DayQuantities {
                weekday,
                items: sorted_items(items),
            })
            .collect(),
        totals: sorted_items(totals),
    }
}

/// Per-weekday order slips, sorted by orderer name then order id
pub fn kitchen_sheet(orders: &[Order], filter: ReportFilter) -> KitchenSheet {
    let mut days: BTreeMap<Weekday, Vec<OrderSlip>> =
        Weekday::ALL.iter().map(|d| (*d, Vec::new())).collect();

    for order in orders {
        for reservation in &order.reservations {
            let paid = order.paid || reservation.paid;
            if !filter.includes(paid) {
                continue;
            }
            days.entry(reservation.weekday).or_default().push(OrderSlip {
                order_id: order.id,
                reservation_id: reservation.id,
                name: order.name.clone(),
                grade: order.grade.clone(),
                paid,
                lines: reservation
                    .selections
                    .iter()
                    .map(|s| SlipLine {
                        name: s.food_item_name.clone(),
                        quantity: s.quantity,
                    })
                    .collect(),
            });
        }
    }

    KitchenSheet {
        filter,
        days: days
            .into_iter()
            .map(|(weekday, mut slips)| {
                slips.sort_by(|a, b| a.name.cmp(&b.name).then(a.order_id.cmp(&b.order_id)));
                DaySheet { weekday, slips }
            })
            .collect(),
    }
}

#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn Store>,
}

impl ReportService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn form_with_orders(&self, form_id: i64) -> ServiceResult<(Form, Vec<Order>)> {
        let form = self
            .store
            .find_form(form_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::FormNotFound))?;
        let orders = self
            .store
            .list_orders(&OrderQuery {
                form_id: Some(form_id),
                ..OrderQuery::default()
            })
            .await?;
        Ok((form, orders))
    }

    async fn orders_between(&self, from: i64, to: i64) -> ServiceResult<Vec<Order>> {
        if from >= to {
            return Err(AppError::with_message(
                ErrorCode::ValueOutOfRange,
                "Report range start must be before its end",
            )
            .with_detail("from", from)
            .with_detail("to", to)
            .into());
        }
        Ok(self
            .store
            .list_orders(&OrderQuery {
                created_from: Some(from),
                created_to: Some(to),
                ..OrderQuery::default()
            })
            .await?)
    }

    pub async fn form_quantities(
        &self,
        form_id: i64,
        filter: ReportFilter,
    ) -> ServiceResult<QuantityReport> {
        let (form, orders) = self.form_with_orders(form_id).await?;
        let ids: Vec<i64> = form
            .options
            .iter()
            .flat_map(|o| o.food_item_ids.iter().copied())
            .collect();
        let catalog: HashMap<i64, FoodItem> = self
            .store
            .find_food_items(&ids)
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();
        Ok(quantity_report(
            &seed_from_form(&form, &catalog),
            &orders,
            filter,
        ))
    }

    pub async fn form_kitchen_sheet(
        &self,
        form_id: i64,
        filter: ReportFilter,
    ) -> ServiceResult<KitchenSheet> {
        let (_, orders) = self.form_with_orders(form_id).await?;
        Ok(kitchen_sheet(&orders, filter))
    }

    /// Quantities over orders created in `[from, to)`
    pub async fn range_quantities(
        &self,
        from: i64,
        to: i64,
        filter: ReportFilter,
    ) -> ServiceResult<QuantityReport> {
        let orders = self.orders_between(from, to).await?;
        Ok(quantity_report(&[], &orders, filter))
    }

    pub async fn range_kitchen_sheet(
        &self,
        from: i64,
        to: i64,
        filter: ReportFilter,
    ) -> ServiceResult<KitchenSheet> {
        let orders = self.orders_between(from, to).await?;
        Ok(kitchen_sheet(&orders, filter))
    }

    /// Run a bulk action; every listed order must exist
    pub async fn run_action(&self, action: &AdminAction) -> ServiceResult<AdminActionOutcome> {
        let ids: Vec<i64> = action
            .order_ids()
            .iter()
            .copied()
            .collect::<BTreeSet<i64>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Err(AppError::with_message(ErrorCode::RequiredField, "No orders selected").into());
        }

        let orders = self.store.find_orders(&ids).await?;
        if orders.len() != ids.len() {
            let found: BTreeSet<i64> = orders.iter().map(|o| o.id).collect();
            let missing: Vec<i64> = ids.iter().copied().filter(|id| !found.contains(id)).collect();
            return Err(AppError::new(ErrorCode::OrderNotFound)
                .with_detail("order_ids", missing)
                .into());
        }

        let outcome = match action {
            AdminAction::KitchenSheet { .. } => AdminActionOutcome::KitchenSheet {
                sheet: kitchen_sheet(&orders, ReportFilter::All),
            },
            AdminAction::RequiredQuantities { .. } => AdminActionOutcome::RequiredQuantities {
                report: quantity_report(&[], &orders, ReportFilter::All),
            },
            AdminAction::MarkPaid { .. } => {
                let updated = self.store.mark_orders_paid(&ids).await?;
                tracing::info!(selected = ids.len(), updated, "Orders marked paid by admin");
                AdminActionOutcome::MarkPaid { updated }
            }
        };
        tracing::debug!(action = action.name(), orders = ids.len(), "Admin action");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::{CatalogStore, NewOrder, NewProfile, NewReservation, OrderStore, ProfileStore};
    use shared::models::{
        FoodCategory, FoodItemCreate, FormUpsert, MenuOption, Reservation, Selection,
    };

    fn selection(id: i64, name: &str, quantity: i64) -> Selection {
        Selection {
            food_item_id: id,
            food_item_name: name.into(),
            unit_price: 10,
            quantity,
        }
    }

    fn order(id: i64, name: &str, paid: bool, days: Vec<(Weekday, bool, Vec<Selection>)>) -> Order {
        let reservations: Vec<Reservation> = days
            .into_iter()
            .enumerate()
            .map(|(i, (weekday, paid, selections))| Reservation {
                id: id * 10 + i as i64,
                order_id: id,
                weekday,
                paid,
                selections,
            })
            .collect();
        Order {
            id,
            profile_id: id,
            form_id: 1,
            name: name.into(),
            grade: "Grade 4".into(),
            total: reservations.iter().map(|r| r.subtotal()).sum(),
            paid,
            created_at: 0,
            reservations,
        }
    }

    #[test]
    fn test_quantity_report_sums_and_seeds() {
        let orders = vec![
            order(1, "Ana", true, vec![(Weekday::Monday, true, vec![selection(1, "Rice", 2)])]),
            order(
                2,
                "Ben",
                false,
                vec![
                    (Weekday::Monday, false, vec![selection(1, "Rice", 1), selection(2, "Juice", 3)]),
                    (Weekday::Friday, true, vec![selection(2, "Juice", 1)]),
                ],
            ),
        ];
        let seed = vec![(Weekday::Tuesday, 1, "Rice".to_string())];

        let all = quantity_report(&seed, &orders, ReportFilter::All);
        assert_eq!(all.days.len(), 5);
        assert_eq!(all.quantity(Weekday::Monday, 1), Some(3));
        assert_eq!(all.quantity(Weekday::Monday, 2), Some(3));
        assert_eq!(all.quantity(Weekday::Tuesday, 1), Some(0));
        assert_eq!(all.quantity(Weekday::Wednesday, 1), None);
        assert_eq!(all.total(1), Some(3));
        assert_eq!(all.total(2), Some(4));
        assert_eq!(all.days[0].items[0].name, "Juice");

        let paid = quantity_report(&seed, &orders, ReportFilter::PaidOnly);
        assert_eq!(paid.quantity(Weekday::Monday, 1), Some(2));
        assert_eq!(paid.quantity(Weekday::Monday, 2), None);
        assert_eq!(paid.quantity(Weekday::Friday, 2), Some(1));
        assert_eq!(paid.total(2), Some(1));
    }

    #[test]
    fn test_kitchen_sheet_ordering() {
        let orders = vec![
            order(3, "Carl", false, vec![(Weekday::Monday, false, vec![selection(1, "Rice", 1)])]),
            order(1, "Ana", true, vec![(Weekday::Monday, true, vec![selection(1, "Rice", 2)])]),
            order(2, "Ana", false, vec![(Weekday::Tuesday, true, vec![selection(2, "Juice", 1)])]),
        ];

        let sheet = kitchen_sheet(&orders, ReportFilter::All);
        let monday = sheet.day(Weekday::Monday).unwrap();
        assert_eq!(
            monday.slips.iter().map(|s| s.order_id).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(monday.slips[0].lines[0].quantity, 2);

        let paid = kitchen_sheet(&orders, ReportFilter::PaidOnly);
        assert_eq!(paid.day(Weekday::Monday).unwrap().slips.len(), 1);
        // Reservation paid on its own
        assert_eq!(paid.day(Weekday::Tuesday).unwrap().slips[0].order_id, 2);
        assert!(paid.day(Weekday::Friday).unwrap().slips.is_empty());
    }

    async fn store_with_order() -> (Arc<MemoryStore>, Form, Order) {
        let store = Arc::new(MemoryStore::new());
        let rice = store
            .create_food_item(&FoodItemCreate {
                name: "Rice Meal".into(),
                price: 60,
                category: FoodCategory::Lunch,
                image: String::new(),
            })
            .await
            .unwrap();
        let form = store
            .create_form(
                &FormUpsert {
                    category: FoodCategory::Lunch,
                    week: "2024-W01".into(),
                    active: true,
                    options: vec![MenuOption {
                        weekday: Weekday::Monday,
                        food_item_ids: vec![rice.id],
                    }],
                },
                0,
            )
            .await
            .unwrap();
        let profile = store
            .create_profile(&NewProfile {
                email: "ana@school.edu.ph".into(),
                name: "Ana".into(),
                role: None,
                department: None,
                coins: 0,
                is_admin: false,
                created_at: 0,
            })
            .await
            .unwrap();
        let order = store
            .create_order(&NewOrder {
                profile_id: profile.id,
                form_id: form.id,
                name: "Ana".into(),
                grade: String::new(),
                total: 120,
                coins_awarded: 40,
                created_at: 1_000,
                reservations: vec![NewReservation {
                    weekday: Weekday::Monday,
                    selections: vec![selection(rice.id, "Rice Meal", 2)],
                }],
            })
            .await
            .unwrap();
        (store, form, order)
    }

    #[tokio::test]
    async fn test_form_report_seeded_with_menu() {
        let (store, form, _) = store_with_order().await;
        let reports = ReportService::new(store);

        let paid = reports
            .form_quantities(form.id, ReportFilter::PaidOnly)
            .await
            .unwrap();
        assert_eq!(paid.days[0].items.len(), 1);
        assert_eq!(paid.days[0].items[0].quantity, 0);

        let all = reports.form_quantities(form.id, ReportFilter::All).await.unwrap();
        assert_eq!(all.days[0].items[0].quantity, 2);

        let err: AppError = reports
            .form_quantities(9999, ReportFilter::All)
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::FormNotFound);
    }

    #[tokio::test]
    async fn test_range_bounds() {
        let (store, _, _) = store_with_order().await;
        let reports = ReportService::new(store);

        let inside = reports
            .range_kitchen_sheet(1_000, 2_000, ReportFilter::All)
            .await
            .unwrap();
        assert_eq!(inside.day(Weekday::Monday).unwrap().slips.len(), 1);

        let outside = reports
            .range_quantities(0, 1_000, ReportFilter::All)
            .await
            .unwrap();
        assert!(outside.totals.is_empty());

        let err: AppError = reports
            .range_quantities(5, 5, ReportFilter::All)
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
    }

    #[tokio::test]
    async fn test_actions() {
        let (store, _, order) = store_with_order().await;
        let reports = ReportService::new(store.clone());

        let err: AppError = reports
            .run_action(&AdminAction::MarkPaid { order_ids: vec![] })
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::RequiredField);

        let err: AppError = reports
            .run_action(&AdminAction::MarkPaid {
                order_ids: vec![order.id, 9999],
            })
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.code, ErrorCode::OrderNotFound);
        assert!(!store.find_order(order.id).await.unwrap().unwrap().paid);

        let outcome = reports
            .run_action(&AdminAction::RequiredQuantities {
                order_ids: vec![order.id],
            })
            .await
            .unwrap();
        let rice_id = order.reservations[0].selections[0].food_item_id;
        match outcome {
            AdminActionOutcome::RequiredQuantities { report } => {
                assert_eq!(report.quantity(Weekday::Monday, rice_id), Some(2));
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let action = AdminAction::MarkPaid {
            order_ids: vec![order.id, order.id],
        };
        assert_eq!(
            reports.run_action(&action).await.unwrap(),
            AdminActionOutcome::MarkPaid { updated: 1 }
        );
        assert_eq!(
            reports.run_action(&action).await.unwrap(),
            AdminActionOutcome::MarkPaid { updated: 0 }
        );
    }
}
