//! Order, reservation and selection models

use serde::{Deserialize, Serialize};

use super::form::Weekday;

/// One food item line within a reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub food_item_id: i64,
    pub food_item_name: String,
    /// Price at submission time, in pesos
    pub unit_price: i64,
    pub quantity: i64,
}

impl Selection {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.quantity
    }
}

/// The part of an order for a single weekday
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub order_id: i64,
    pub weekday: Weekday,
    pub paid: bool,
    pub selections: Vec<Selection>,
}

impl Reservation {
    pub fn subtotal(&self) -> i64 {
        self.selections.iter().map(Selection::line_total).sum()
    }
}

/// One employee's weekly submission for one form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub profile_id: i64,
    pub form_id: i64,
    /// Snapshot of the profile name
    pub name: String,
    /// Snapshot of the profile department
    pub grade: String,
    /// Total in pesos
    pub total: i64,
    pub paid: bool,
    pub created_at: i64,
    /// Ordered by weekday
    pub reservations: Vec<Reservation>,
}

impl Order {
    pub fn reservation(&self, reservation_id: i64) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == reservation_id)
    }

    /// Sum of reservation subtotals; equals `total` for every persisted order
    pub fn computed_total(&self) -> i64 {
        self.reservations.iter().map(Reservation::subtotal).sum()
    }

    /// Pesos still owed: subtotals of the days not yet paid
    pub fn outstanding(&self) -> i64 {
        if self.paid {
            return 0;
        }
        self.reservations
            .iter()
            .filter(|r| !r.paid)
            .map(Reservation::subtotal)
            .sum()
    }

    /// True once any money was confirmed for the order
    pub fn has_payment(&self) -> bool {
        self.paid || self.reservations.iter().any(|r| r.paid)
    }
}

/// Requested quantity of one food item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionInput {
    pub food_item_id: i64,
    pub quantity: i64,
}

/// Requested items for one weekday
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySelection {
    pub weekday: Weekday,
    #[serde(default)]
    pub items: Vec<SelectionInput>,
}

/// Order submission payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSubmission {
    pub form_id: i64,
    #[serde(default)]
    pub days: Vec<DaySelection>,
}

/// Admin order listing filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQuery {
    pub form_id: Option<i64>,
    pub week: Option<String>,
    pub paid: Option<bool>,
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<i64>,
    /// Exclusive upper bound on `created_at`
    pub created_to: Option<i64>,
}

/// What a checkout session pays for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum PaymentTarget {
    /// Whole weekly order
    Order(i64),
    /// One weekday of an order
    Reservation(i64),
}

impl PaymentTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Order(_) => "order",
            Self::Reservation(_) => "reservation",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::Order(id) | Self::Reservation(id) => *id,
        }
    }

    /// Parse from the `(kind, id)` column pair
    pub fn from_db(kind: &str, id: i64) -> Option<Self> {
        match kind {
            "order" => Some(Self::Order(id)),
            "reservation" => Some(Self::Reservation(id)),
            _ => None,
        }
    }
}

/// Hosted checkout created for an order or reservation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    /// Amount in pesos, before the service fee
    pub amount: i64,
    /// Service fee in centavos
    pub service_fee: i64,
}
