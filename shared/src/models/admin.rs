//! Admin bulk actions over a selected set of orders

use serde::{Deserialize, Serialize};

use super::report::{KitchenSheet, QuantityReport};

/// Bulk operation requested from the admin order list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminAction {
    /// Kitchen handoff listing for the selected orders
    KitchenSheet { order_ids: Vec<i64> },
    /// Quantities to prepare for the selected orders
    RequiredQuantities { order_ids: Vec<i64> },
    /// Manual payment override
    MarkPaid { order_ids: Vec<i64> },
}

impl AdminAction {
    pub fn order_ids(&self) -> &[i64] {
        match self {
            Self::KitchenSheet { order_ids }
            | Self::RequiredQuantities { order_ids }
            | Self::MarkPaid { order_ids } => order_ids,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::KitchenSheet { .. } => "kitchen_sheet",
            Self::RequiredQuantities { .. } => "required_quantities",
            Self::MarkPaid { .. } => "mark_paid",
        }
    }
}

/// Result of an [`AdminAction`], one variant per action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminActionOutcome {
    KitchenSheet { sheet: KitchenSheet },
    RequiredQuantities { report: QuantityReport },
    MarkPaid { updated: u64 },
}
