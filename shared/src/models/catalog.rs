//! Food item catalog model

use serde::{Deserialize, Serialize};

/// Which weekly form a food item can appear on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FoodCategory {
    Lunch,
    Snacks,
}

impl FoodCategory {
    pub const ALL: [FoodCategory; 2] = [FoodCategory::Lunch, FoodCategory::Snacks];

    /// Parse from database string value
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "LUNCH" => Some(Self::Lunch),
            "SNACKS" => Some(Self::Snacks),
            _ => None,
        }
    }

    /// Database string representation
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Lunch => "LUNCH",
            Self::Snacks => "SNACKS",
        }
    }
}

/// Food item entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: i64,
    pub name: String,
    /// Price in whole pesos
    pub price: i64,
    pub category: FoodCategory,
    /// Image URL
    pub image: String,
}

/// Create food item payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodItemCreate {
    pub name: String,
    pub price: i64,
    pub category: FoodCategory,
    #[serde(default)]
    pub image: String,
}

/// Update food item payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoodItemUpdate {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub category: Option<FoodCategory>,
    pub image: Option<String>,
}

impl FoodItemUpdate {
    /// Apply the present fields onto an existing item
    pub fn apply_to(&self, item: &mut FoodItem) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(image) = &self.image {
            item.image = image.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_db_roundtrip() {
        for category in FoodCategory::ALL {
            assert_eq!(FoodCategory::from_db(category.as_db()), Some(category));
        }
        assert_eq!(FoodCategory::from_db("lunch"), None);
    }

    #[test]
    fn test_category_serde_matches_db() {
        let json = serde_json::to_string(&FoodCategory::Snacks).unwrap();
        assert_eq!(json, "\"SNACKS\"");
    }

    #[test]
    fn test_update_applies_only_present_fields() {
        let mut item = FoodItem {
            id: 1,
            name: "Rice Meal".into(),
            price: 60,
            category: FoodCategory::Lunch,
            image: String::new(),
        };
        let update = FoodItemUpdate {
            price: Some(65),
            ..Default::default()
        };
        update.apply_to(&mut item);
        assert_eq!(item.price, 65);
        assert_eq!(item.name, "Rice Meal");
    }
}
