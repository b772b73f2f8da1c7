//! Weekly ordering form model
//!
//! A form is one week of one category (lunch or snacks). It owns one menu
//! option per weekday; each option lists the food items offered that day.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::catalog::{FoodCategory, FoodItem};

/// School weekday, Monday (1) through Friday (5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Weekday {
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    #[inline]
    pub const fn number(&self) -> u8 {
        *self as u8
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
        }
    }

    /// Parse from the SMALLINT column
    pub fn from_db(value: i16) -> Option<Self> {
        u8::try_from(value).ok().and_then(|v| Self::try_from(v).ok())
    }

    pub fn as_db(&self) -> i16 {
        i16::from(self.number())
    }
}

impl From<Weekday> for u8 {
    fn from(day: Weekday) -> Self {
        day.number()
    }
}

impl TryFrom<u8> for Weekday {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Monday),
            2 => Ok(Self::Tuesday),
            3 => Ok(Self::Wednesday),
            4 => Ok(Self::Thursday),
            5 => Ok(Self::Friday),
            _ => Err(format!("weekday must be 1-5, got {value}")),
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse an ISO week identifier such as `2024-W01` into its Monday
pub fn week_start(week: &str) -> Option<NaiveDate> {
    let (year, number) = week.trim().split_once("-W")?;
    let year: i32 = year.parse().ok()?;
    let number: u32 = number.parse().ok()?;
    NaiveDate::from_isoywd_opt(year, number, chrono::Weekday::Mon)
}

/// Human-readable week period, e.g. `Jan 01, 2024 - Jan 07, 2024`.
/// Falls back to the raw identifier when it does not parse.
pub fn display_week(week: &str) -> String {
    match week_start(week) {
        Some(start) => {
            let end = start + Duration::days(6);
            format!(
                "{} - {}",
                start.format("%b %d, %Y"),
                end.format("%b %d, %Y")
            )
        }
        None => week.to_string(),
    }
}

/// Food items offered on one weekday of a form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    pub weekday: Weekday,
    pub food_item_ids: Vec<i64>,
}

impl MenuOption {
    pub fn offers(&self, food_item_id: i64) -> bool {
        self.food_item_ids.contains(&food_item_id)
    }
}

/// Weekly form entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    pub id: i64,
    pub category: FoodCategory,
    /// ISO week identifier (e.g., 2024-W01)
    pub week: String,
    pub active: bool,
    pub created_at: i64,
    /// Ordered by weekday
    #[serde(default)]
    pub options: Vec<MenuOption>,
}

impl Form {
    pub fn option_for(&self, weekday: Weekday) -> Option<&MenuOption> {
        self.options.iter().find(|o| o.weekday == weekday)
    }

    pub fn display_week(&self) -> String {
        display_week(&self.week)
    }

    /// Same category, week and per-day item sets as `data`; only the
    /// active flag may differ
    pub fn same_menu(&self, data: &FormUpsert) -> bool {
        self.category == data.category
            && self.week == data.week.trim()
            && menu_shape(&self.options) == menu_shape(&data.options)
    }
}

fn menu_shape(options: &[MenuOption]) -> BTreeMap<Weekday, BTreeSet<i64>> {
    let mut shape: BTreeMap<Weekday, BTreeSet<i64>> = BTreeMap::new();
    for option in options {
        shape
            .entry(option.weekday)
            .or_default()
            .extend(option.food_item_ids.iter().copied());
    }
    shape
}

/// Create / replace payload for a form and its options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormUpsert {
    pub category: FoodCategory,
    pub week: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub options: Vec<MenuOption>,
}

/// Admin listing row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSummary {
    pub id: i64,
    pub category: FoodCategory,
    pub week: String,
    pub week_period: String,
    pub active: bool,
    pub created_at: i64,
    pub total_orders: i64,
}

/// One weekday of the active menu, with item details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuDay {
    pub weekday: Weekday,
    pub items: Vec<FoodItem>,
}

/// Active form as shown to an employee
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveMenu {
    pub form_id: i64,
    pub category: FoodCategory,
    pub week: String,
    pub week_period: String,
    pub days: Vec<MenuDay>,
    /// Whether the caller already has an order on this form
    pub submitted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_serde_as_number() {
        assert_eq!(serde_json::to_string(&Weekday::Wednesday).unwrap(), "3");
        let day: Weekday = serde_json::from_str("5").unwrap();
        assert_eq!(day, Weekday::Friday);
        assert!(serde_json::from_str::<Weekday>("6").is_err());
        assert!(serde_json::from_str::<Weekday>("0").is_err());
    }

    #[test]
    fn test_weekday_db() {
        assert_eq!(Weekday::from_db(1), Some(Weekday::Monday));
        assert_eq!(Weekday::from_db(-1), None);
        assert_eq!(Weekday::Thursday.as_db(), 4);
    }

    #[test]
    fn test_week_start() {
        assert_eq!(week_start("2024-W01"), NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(week_start("2021-W01"), NaiveDate::from_ymd_opt(2021, 1, 4));
        assert_eq!(week_start("2024-W54"), None);
        assert_eq!(week_start("2024-01"), None);
        assert_eq!(week_start("W01"), None);
    }

    #[test]
    fn test_display_week() {
        assert_eq!(display_week("2024-W01"), "Jan 01, 2024 - Jan 07, 2024");
        assert_eq!(display_week("next week"), "next week");
    }

    #[test]
    fn test_option_lookup() {
        let form = Form {
            id: 1,
            category: FoodCategory::Lunch,
            week: "2024-W01".into(),
            active: true,
            created_at: 0,
            options: vec![MenuOption {
                weekday: Weekday::Monday,
                food_item_ids: vec![10, 11],
            }],
        };
        assert!(form.option_for(Weekday::Monday).unwrap().offers(11));
        assert!(form.option_for(Weekday::Tuesday).is_none());
    }

    #[test]
    fn test_same_menu_ignores_order_and_active() {
        let form = Form {
            id: 1,
            category: FoodCategory::Lunch,
            week: "2024-W01".into(),
            active: true,
            created_at: 0,
            options: vec![MenuOption {
                weekday: Weekday::Monday,
                food_item_ids: vec![10, 11],
            }],
        };
        let mut upsert = FormUpsert {
            category: FoodCategory::Lunch,
            week: " 2024-W01 ".into(),
            active: false,
            options: vec![MenuOption {
                weekday: Weekday::Monday,
                food_item_ids: vec![11, 10],
            }],
        };
        assert!(form.same_menu(&upsert));

        upsert.options[0].food_item_ids.pop();
        assert!(!form.same_menu(&upsert));

        upsert.options[0].food_item_ids.push(10);
        upsert.category = FoodCategory::Snacks;
        assert!(!form.same_menu(&upsert));
    }
}
