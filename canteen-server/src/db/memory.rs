//! In-process store with the same semantics as [`super::postgres::PgStore`]
//!
//! One lock guards every table, so each trait call is atomic.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::models::{
    FoodCategory, FoodItem, FoodItemCreate, FoodItemUpdate, Form, FormSummary, FormUpsert,
    MenuOption, Order, OrderQuery, Profile, ProfileSummary, Reservation,
};

use super::{
    CatalogStore, CheckoutSession, NewOrder, NewProfile, OrderStore, PaymentStore, ProfileStore,
    RepoError, RepoResult, ReservationPaid,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    food_items: BTreeMap<i64, FoodItem>,
    forms: BTreeMap<i64, Form>,
    profiles: BTreeMap<i64, Profile>,
    orders: BTreeMap<i64, Order>,
    checkout_sessions: HashMap<String, CheckoutSession>,
    webhook_events: HashSet<String>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn deactivate_others(&mut self, category: FoodCategory, keep: i64) {
        for form in self.forms.values_mut() {
            if form.category == category && form.id != keep {
                form.active = false;
            }
        }
    }

    fn food_item_on_menu(&self, id: i64) -> bool {
        self.forms
            .values()
            .flat_map(|f| &f.options)
            .any(|o| o.offers(id))
    }

    fn food_item_in_use(&self, id: i64) -> bool {
        self.food_item_on_menu(id)
            || self
                .orders
                .values()
                .flat_map(|o| &o.reservations)
                .flat_map(|r| &r.selections)
                .any(|s| s.food_item_id == id)
    }

    fn form_has_orders(&self, form_id: i64) -> bool {
        self.orders.values().any(|o| o.form_id == form_id)
    }

    fn order_id_for_reservation(&self, reservation_id: i64) -> Option<i64> {
        self.orders
            .values()
            .find(|o| o.reservation(reservation_id).is_some())
            .map(|o| o.id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_options(options: &[MenuOption]) -> Vec<MenuOption> {
    let mut options = options.to_vec();
    options.sort_by_key(|o| o.weekday);
    for option in &mut options {
        let mut seen = HashSet::new();
        option.food_item_ids.retain(|id| seen.insert(*id));
    }
    options
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_food_items(&self, category: Option<FoodCategory>) -> RepoResult<Vec<FoodItem>> {
        let tables = self.tables.lock();
        let mut items: Vec<FoodItem> = tables
            .food_items
            .values()
            .filter(|i| category.is_none_or(|c| i.category == c))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn find_food_items(&self, ids: &[i64]) -> RepoResult<Vec<FoodItem>> {
        let tables = self.tables.lock();
        let wanted: HashSet<i64> = ids.iter().copied().collect();
        Ok(tables
            .food_items
            .values()
            .filter(|i| wanted.contains(&i.id))
            .cloned()
            .collect())
    }

    async fn create_food_item(&self, data: &FoodItemCreate) -> RepoResult<FoodItem> {
        let mut tables = self.tables.lock();
        let item = FoodItem {
            id: tables.next_id(),
            name: data.name.clone(),
            price: data.price,
            category: data.category,
            image: data.image.clone(),
        };
        tables.food_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_food_item(&self, id: i64, data: &FoodItemUpdate) -> RepoResult<FoodItem> {
        let mut tables = self.tables.lock();
        let current = tables
            .food_items
            .get(&id)
            .map(|i| i.category)
            .ok_or_else(|| RepoError::NotFound(format!("food item {id}")))?;
        if data.category.is_some_and(|c| c != current) && tables.food_item_on_menu(id) {
            return Err(RepoError::Conflict(format!("food item {id} is on a menu")));
        }
        let Some(item) = tables.food_items.get_mut(&id) else {
            return Err(RepoError::NotFound(format!("food item {id}")));
        };
        data.apply_to(item);
        Ok(item.clone())
    }

    async fn delete_food_item(&self, id: i64) -> RepoResult<()> {
        let mut tables = self.tables.lock();
        if !tables.food_items.contains_key(&id) {
            return Err(RepoError::NotFound(format!("food item {id}")));
        }
        if tables.food_item_in_use(id) {
            return Err(RepoError::Conflict(format!("food item {id} is referenced")));
        }
        tables.food_items.remove(&id);
        Ok(())
    }

    async fn list_forms(&self) -> RepoResult<Vec<FormSummary>> {
        let tables = self.tables.lock();
        let mut forms: Vec<FormSummary> = tables
            .forms
            .values()
            .map(|f| FormSummary {
                id: f.id,
                category: f.category,
                week: f.week.clone(),
                week_period: f.display_week(),
                active: f.active,
                created_at: f.created_at,
                total_orders: tables.orders.values().filter(|o| o.form_id == f.id).count() as i64,
            })
            .collect();
        forms.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(forms)
    }

    async fn find_form(&self, id: i64) -> RepoResult<Option<Form>> {
        Ok(self.tables.lock().forms.get(&id).cloned())
    }

    async fn find_active_form(&self, category: FoodCategory) -> RepoResult<Option<Form>> {
        let tables = self.tables.lock();
        Ok(tables
            .forms
            .values()
            .find(|f| f.active && f.category == category)
            .cloned())
    }

    async fn create_form(&self, data: &FormUpsert, now: i64) -> RepoResult<Form> {
        let mut tables = self.tables.lock();
        let form = Form {
            id: tables.next_id(),
            category: data.category,
            week: data.week.trim().to_string(),
            active: data.active,
            created_at: now,
            options: sorted_options(&data.options),
        };
        if form.active {
            tables.deactivate_others(form.category, form.id);
        }
        tables.forms.insert(form.id, form.clone());
        Ok(form)
    }

    async fn replace_form(&self, id: i64, data: &FormUpsert) -> RepoResult<Form> {
        let mut tables = self.tables.lock();
        let has_orders = tables.form_has_orders(id);
        let form = tables
            .forms
            .get_mut(&id)
            .ok_or_else(|| RepoError::NotFound(format!("form {id}")))?;
        if has_orders && !form.same_menu(data) {
            return Err(RepoError::Conflict(format!("form {id} has orders")));
        }
        form.category = data.category;
        form.week = data.week.trim().to_string();
        form.active = data.active;
        form.options = sorted_options(&data.options);
        let form = form.clone();
        if form.active {
            tables.deactivate_others(form.category, form.id);
        }
        Ok(form)
    }

    async fn set_form_active(&self, id: i64, active: bool) -> RepoResult<Form> {
        let mut tables = self.tables.lock();
        let form = tables
            .forms
            .get_mut(&id)
            .ok_or_else(|| RepoError::NotFound(format!("form {id}")))?;
        form.active = active;
        let form = form.clone();
        if active {
            tables.deactivate_others(form.category, form.id);
        }
        Ok(form)
    }

    async fn delete_form(&self, id: i64) -> RepoResult<()> {
        let mut tables = self.tables.lock();
        if !tables.forms.contains_key(&id) {
            return Err(RepoError::NotFound(format!("form {id}")));
        }
        if tables.form_has_orders(id) {
            return Err(RepoError::Conflict(format!("form {id} has orders")));
        }
        tables.forms.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn find_profile(&self, id: i64) -> RepoResult<Option<Profile>> {
        Ok(self.tables.lock().profiles.get(&id).cloned())
    }

    async fn find_profile_by_email(&self, email: &str) -> RepoResult<Option<Profile>> {
        let tables = self.tables.lock();
        Ok(tables
            .profiles
            .values()
            .find(|p| p.email == email)
            .cloned())
    }

    async fn create_profile(&self, data: &NewProfile) -> RepoResult<Profile> {
        let mut tables = self.tables.lock();
        if tables.profiles.values().any(|p| p.email == data.email) {
            return Err(RepoError::Duplicate(format!("profile {}", data.email)));
        }
        let profile = Profile {
            id: tables.next_id(),
            email: data.email.clone(),
            name: data.name.clone(),
            role: data.role.clone(),
            department: data.department.clone(),
            coins: data.coins,
            is_admin: data.is_admin,
            created_at: data.created_at,
        };
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn list_profiles(&self) -> RepoResult<Vec<ProfileSummary>> {
        let tables = self.tables.lock();
        let mut profiles: Vec<ProfileSummary> = tables
            .profiles
            .values()
            .map(|p| {
                let orders = tables.orders.values().filter(|o| o.profile_id == p.id);
                let (total, unpaid) =
                    orders.fold((0, 0), |(t, u), o| (t + 1, u + i64::from(!o.paid)));
                ProfileSummary {
                    profile: p.clone(),
                    total_orders: total,
                    unpaid_orders: unpaid,
                }
            })
            .collect();
        profiles.sort_by(|a, b| a.profile.name.cmp(&b.profile.name));
        Ok(profiles)
    }
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(&self, data: &NewOrder) -> RepoResult<Order> {
        let mut tables = self.tables.lock();
        if tables
            .orders
            .values()
            .any(|o| o.profile_id == data.profile_id && o.form_id == data.form_id)
        {
            return Err(RepoError::Duplicate(format!(
                "order for profile {} on form {}",
                data.profile_id, data.form_id
            )));
        }
        if !tables.profiles.contains_key(&data.profile_id) {
            return Err(RepoError::NotFound(format!("profile {}", data.profile_id)));
        }

        let order_id = tables.next_id();
        let mut reservations = Vec::with_capacity(data.reservations.len());
        for new in &data.reservations {
            reservations.push(Reservation {
                id: tables.next_id(),
                order_id,
                weekday: new.weekday,
                paid: false,
                selections: new.selections.clone(),
            });
        }
        reservations.sort_by_key(|r| r.weekday);

        let order = Order {
            id: order_id,
            profile_id: data.profile_id,
            form_id: data.form_id,
            name: data.name.clone(),
            grade: data.grade.clone(),
            total: data.total,
            paid: false,
            created_at: data.created_at,
            reservations,
        };
        tables.orders.insert(order.id, order.clone());
        if let Some(profile) = tables.profiles.get_mut(&data.profile_id) {
            profile.coins += data.coins_awarded;
        }
        Ok(order)
    }

    async fn find_order(&self, id: i64) -> RepoResult<Option<Order>> {
        Ok(self.tables.lock().orders.get(&id).cloned())
    }

    async fn find_order_by_reservation(&self, reservation_id: i64) -> RepoResult<Option<Order>> {
        let tables = self.tables.lock();
        Ok(tables
            .order_id_for_reservation(reservation_id)
            .and_then(|id| tables.orders.get(&id).cloned()))
    }

    async fn find_orders(&self, ids: &[i64]) -> RepoResult<Vec<Order>> {
        let tables = self.tables.lock();
        let wanted: HashSet<i64> = ids.iter().copied().collect();
        Ok(tables
            .orders
            .values()
            .filter(|o| wanted.contains(&o.id))
            .cloned()
            .collect())
    }

    async fn list_orders_for_profile(&self, profile_id: i64) -> RepoResult<Vec<Order>> {
        let tables = self.tables.lock();
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.profile_id == profile_id)
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn has_order_for_form(&self, profile_id: i64, form_id: i64) -> RepoResult<bool> {
        let tables = self.tables.lock();
        Ok(tables
            .orders
            .values()
            .any(|o| o.profile_id == profile_id && o.form_id == form_id))
    }

    async fn list_orders(&self, query: &OrderQuery) -> RepoResult<Vec<Order>> {
        let tables = self.tables.lock();
        let week = query.week.as_deref().map(str::trim);
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| query.form_id.is_none_or(|id| o.form_id == id))
            .filter(|o| query.paid.is_none_or(|paid| o.paid == paid))
            .filter(|o| query.created_from.is_none_or(|from| o.created_at >= from))
            .filter(|o| query.created_to.is_none_or(|to| o.created_at < to))
            .filter(|o| {
                week.is_none_or(|w| tables.forms.get(&o.form_id).is_some_and(|f| f.week == w))
            })
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn delete_unpaid_order(&self, id: i64) -> RepoResult<()> {
        let mut tables = self.tables.lock();
        let order = tables
            .orders
            .get(&id)
            .ok_or_else(|| RepoError::NotFound(format!("order {id}")))?;
        if order.has_payment() {
            return Err(RepoError::Conflict(format!("order {id} has a payment")));
        }
        if tables.checkout_sessions.values().any(|s| s.order_id == id) {
            return Err(RepoError::Conflict(format!("order {id} has a checkout session")));
        }
        tables.orders.remove(&id);
        Ok(())
    }

    async fn mark_orders_paid(&self, ids: &[i64]) -> RepoResult<u64> {
        let mut tables = self.tables.lock();
        let mut updated = 0;
        for id in ids.iter().copied().collect::<HashSet<i64>>() {
            if let Some(order) = tables.orders.get_mut(&id)
                && !order.paid
            {
                order.paid = true;
                for reservation in &mut order.reservations {
                    reservation.paid = true;
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn mark_reservation_paid(&self, reservation_id: i64) -> RepoResult<ReservationPaid> {
        let mut tables = self.tables.lock();
        let order_id = tables
            .order_id_for_reservation(reservation_id)
            .ok_or_else(|| RepoError::NotFound(format!("reservation {reservation_id}")))?;
        let Some(order) = tables.orders.get_mut(&order_id) else {
            return Err(RepoError::NotFound(format!("order {order_id}")));
        };

        let mut changed = false;
        if let Some(reservation) = order
            .reservations
            .iter_mut()
            .find(|r| r.id == reservation_id)
            && !reservation.paid
        {
            reservation.paid = true;
            changed = true;
        }
        if !order.paid && order.reservations.iter().all(|r| r.paid) {
            order.paid = true;
        }
        Ok(ReservationPaid {
            changed,
            order_paid: order.paid,
        })
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn record_checkout_session(&self, session: &CheckoutSession) -> RepoResult<()> {
        let mut tables = self.tables.lock();
        if tables.checkout_sessions.contains_key(&session.id) {
            return Err(RepoError::Duplicate(format!("checkout session {}", session.id)));
        }
        tables
            .checkout_sessions
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find_checkout_session(&self, id: &str) -> RepoResult<Option<CheckoutSession>> {
        Ok(self.tables.lock().checkout_sessions.get(id).cloned())
    }

    async fn record_webhook_event(
        &self,
        event_id: &str,
        _event_type: &str,
        _now: i64,
    ) -> RepoResult<bool> {
        Ok(self.tables.lock().webhook_events.insert(event_id.to_string()))
    }
}
