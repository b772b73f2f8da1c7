//! Kitchen preparation report models

use serde::{Deserialize, Serialize};

use super::form::Weekday;

/// Which orders a report reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFilter {
    PaidOnly,
    #[default]
    All,
}

impl ReportFilter {
    pub fn from_paid_only(paid_only: bool) -> Self {
        if paid_only { Self::PaidOnly } else { Self::All }
    }

    pub fn includes(&self, paid: bool) -> bool {
        match self {
            Self::PaidOnly => paid,
            Self::All => true,
        }
    }
}

/// Quantity of one food item to prepare
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantity {
    pub food_item_id: i64,
    pub name: String,
    pub quantity: i64,
}

/// Quantities for one weekday
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayQuantities {
    pub weekday: Weekday,
    pub items: Vec<ItemQuantity>,
}

/// (weekday, food item) → quantity, plus per-item totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityReport {
    pub filter: ReportFilter,
    /// Always five entries, Monday through Friday
    pub days: Vec<DayQuantities>,
    pub totals: Vec<ItemQuantity>,
}

impl QuantityReport {
    pub fn quantity(&self, weekday: Weekday, food_item_id: i64) -> Option<i64> {
        self.days
            .iter()
            .find(|d| d.weekday == weekday)?
            .items
            .iter()
            .find(|i| i.food_item_id == food_item_id)
            .map(|i| i.quantity)
    }

    pub fn total(&self, food_item_id: i64) -> Option<i64> {
        self.totals
            .iter()
            .find(|i| i.food_item_id == food_item_id)
            .map(|i| i.quantity)
    }
}

/// One item line on a kitchen slip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlipLine {
    pub name: String,
    pub quantity: i64,
}

/// One order's reservation for one day, as handed to the kitchen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSlip {
    pub order_id: i64,
    pub reservation_id: i64,
    pub name: String,
    pub grade: String,
    pub paid: bool,
    pub lines: Vec<SlipLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySheet {
    pub weekday: Weekday,
    pub slips: Vec<OrderSlip>,
}

/// Per-weekday order listing for kitchen handoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitchenSheet {
    pub filter: ReportFilter,
    /// Always five entries, Monday through Friday
    pub days: Vec<DaySheet>,
}

impl KitchenSheet {
    pub fn day(&self, weekday: Weekday) -> Option<&DaySheet> {
        self.days.iter().find(|d| d.weekday == weekday)
    }
}
