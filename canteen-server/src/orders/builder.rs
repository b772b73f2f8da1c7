//! Order validation and pricing
//!
//! Pure functions: turn a submission against a form into a [`NewOrder`]
//! with price snapshots, or say exactly why it cannot be accepted.

use std::collections::{BTreeMap, HashMap};

use shared::error::{AppError, ErrorCode};
use shared::models::{FoodItem, Form, OrderSubmission, Profile, Selection, Weekday};
use thiserror::Error;

use crate::db::{NewOrder, NewReservation};

pub const MIN_QUANTITY: i64 = 1;
pub const MAX_QUANTITY: i64 = 99;

/// Coins credited per full block of pesos ordered
const COINS_PER_BLOCK: i64 = 20;
const PESOS_PER_BLOCK: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("form {form_id} is not accepting orders")]
    FormNotActive { form_id: i64 },

    #[error("no menu is offered on {weekday}")]
    WeekdayNotOffered { weekday: Weekday },

    #[error("food item {food_item_id} is not on the {weekday} menu")]
    ItemNotOffered { weekday: Weekday, food_item_id: i64 },

    #[error("quantity {quantity} of food item {food_item_id} on {weekday} is outside 1-99")]
    QuantityOutOfRange {
        weekday: Weekday,
        food_item_id: i64,
        quantity: i64,
    },

    #[error("order has no items")]
    Empty,

    #[error("an order was already submitted for form {form_id}")]
    AlreadySubmitted { form_id: i64 },
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        match err {
            ValidationError::FormNotActive { form_id } => {
                AppError::with_message(ErrorCode::FormNotActive, message)
                    .with_detail("form_id", form_id)
            }
            ValidationError::WeekdayNotOffered { weekday } => {
                AppError::with_message(ErrorCode::WeekdayNotOffered, message)
                    .with_detail("weekday", weekday.number())
            }
            ValidationError::ItemNotOffered {
                weekday,
                food_item_id,
            } => AppError::with_message(ErrorCode::ItemNotOffered, message)
                .with_detail("weekday", weekday.number())
                .with_detail("food_item_id", food_item_id),
            ValidationError::QuantityOutOfRange {
                weekday,
                food_item_id,
                quantity,
            } => AppError::with_message(ErrorCode::QuantityOutOfRange, message)
                .with_detail("weekday", weekday.number())
                .with_detail("food_item_id", food_item_id)
                .with_detail("quantity", quantity),
            ValidationError::Empty => AppError::with_message(ErrorCode::OrderEmpty, message),
            ValidationError::AlreadySubmitted { form_id } => {
                AppError::with_message(ErrorCode::OrderAlreadySubmitted, message)
                    .with_detail("form_id", form_id)
            }
        }
    }
}

/// Coins earned for an order total: 20 per full ₱50
pub fn reward_coins(total: i64) -> i64 {
    (total.max(0) / PESOS_PER_BLOCK) * COINS_PER_BLOCK
}

/// Validate `submission` against `form` and price it from `catalog`.
///
/// Repeated entries for the same weekday and item are summed before the
/// range check; zero quantities are dropped, and so are days left empty.
pub fn build_order(
    form: &Form,
    catalog: &HashMap<i64, FoodItem>,
    submission: &OrderSubmission,
    profile: &Profile,
    now: i64,
) -> Result<NewOrder, ValidationError> {
    if !form.active {
        return Err(ValidationError::FormNotActive { form_id: form.id });
    }

    let mut requested: BTreeMap<Weekday, BTreeMap<i64, i64>> = BTreeMap::new();
    for day in &submission.days {
        for item in &day.items {
            if item.quantity < 0 {
                return Err(ValidationError::QuantityOutOfRange {
                    weekday: day.weekday,
                    food_item_id: item.food_item_id,
                    quantity: item.quantity,
                });
            }
            if item.quantity == 0 {
                continue;
            }
            *requested
                .entry(day.weekday)
                .or_default()
                .entry(item.food_item_id)
                .or_default() += item.quantity;
        }
    }

    let mut reservations = Vec::with_capacity(requested.len());
    for (weekday, items) in requested {
        let option = form
            .option_for(weekday)
            .ok_or(ValidationError::WeekdayNotOffered { weekday })?;

        let mut selections = Vec::with_capacity(items.len());
        for (food_item_id, quantity) in items {
            let food = catalog
                .get(&food_item_id)
                .filter(|_| option.offers(food_item_id))
                .ok_or(ValidationError::ItemNotOffered {
                    weekday,
                    food_item_id,
                })?;
            if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
                return Err(ValidationError::QuantityOutOfRange {
                    weekday,
                    food_item_id,
                    quantity,
                });
            }
            selections.push(Selection {
                food_item_id,
                food_item_name: food.name.clone(),
                unit_price: food.price,
                quantity,
            });
        }
        selections.sort_by(|a, b| {
            a.food_item_name
                .cmp(&b.food_item_name)
                .then(a.food_item_id.cmp(&b.food_item_id))
        });
        reservations.push(NewReservation {
            weekday,
            selections,
        });
    }

    if reservations.is_empty() {
        return Err(ValidationError::Empty);
    }

    let total: i64 = reservations
        .iter()
        .flat_map(|r| &r.selections)
        .map(Selection::line_total)
        .sum();

    Ok(NewOrder {
        profile_id: profile.id,
        form_id: form.id,
        name: profile.name.clone(),
        grade: profile.department.clone().unwrap_or_default(),
        total,
        coins_awarded: reward_coins(total),
        created_at: now,
        reservations,
    })
}
