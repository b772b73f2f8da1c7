//! Admin catalog management: food items and weekly forms

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    FoodCategory, FoodItem, FoodItemCreate, FoodItemUpdate, Form, FormSummary, FormUpsert,
    MenuOption, week_start,
};

use crate::db::{RepoError, Store};
use crate::error::ServiceResult;

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

fn validate_item_fields(name: Option<&str>, price: Option<i64>) -> Result<(), AppError> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::with_message(
            ErrorCode::RequiredField,
            "Food item name is required",
        ));
    }
    if price.is_some_and(|p| p < 0) {
        return Err(AppError::new(ErrorCode::FoodItemInvalidPrice));
    }
    Ok(())
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    // ── Food items ──

    pub async fn list_food_items(
        &self,
        category: Option<FoodCategory>,
    ) -> ServiceResult<Vec<FoodItem>> {
        Ok(self.store.list_food_items(category).await?)
    }

    pub async fn create_food_item(&self, data: &FoodItemCreate) -> ServiceResult<FoodItem> {
        validate_item_fields(Some(&data.name), Some(data.price))?;
        let data = FoodItemCreate {
            name: data.name.trim().to_string(),
            ..data.clone()
        };
        let item = self.store.create_food_item(&data).await?;
        tracing::info!(food_item_id = item.id, name = %item.name, "Food item created");
        Ok(item)
    }

    pub async fn update_food_item(
        &self,
        id: i64,
        data: &FoodItemUpdate,
    ) -> ServiceResult<FoodItem> {
        validate_item_fields(data.name.as_deref(), data.price)?;
        match self.store.update_food_item(id, data).await {
            Ok(item) => Ok(item),
            Err(RepoError::NotFound(_)) => Err(AppError::new(ErrorCode::FoodItemNotFound).into()),
            Err(RepoError::Conflict(_)) => Err(AppError::with_message(
                ErrorCode::FoodItemCategoryMismatch,
                "Food item is on a menu of its current category",
            )
            .with_detail("food_item_id", id)
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_food_item(&self, id: i64) -> ServiceResult<()> {
        match self.store.delete_food_item(id).await {
            Ok(()) => {
                tracing::info!(food_item_id = id, "Food item deleted");
                Ok(())
            }
            Err(RepoError::NotFound(_)) => Err(AppError::new(ErrorCode::FoodItemNotFound).into()),
            Err(RepoError::Conflict(_)) => Err(AppError::new(ErrorCode::FoodItemInUse)
                .with_detail("food_item_id", id)
                .into()),
            Err(e) => Err(e.into()),
        }
    }

    // ── Forms ──

    pub async fn list_forms(&self) -> ServiceResult<Vec<FormSummary>> {
        Ok(self.store.list_forms().await?)
    }

    pub async fn get_form(&self, id: i64) -> ServiceResult<Form> {
        self.store
            .find_form(id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::FormNotFound).into())
    }

    pub async fn create_form(&self, data: &FormUpsert) -> ServiceResult<Form> {
        let data = self.validated(data).await?;
        let form = self
            .store
            .create_form(&data, shared::util::now_millis())
            .await?;
        tracing::info!(form_id = form.id, week = %form.week, active = form.active, "Form created");
        Ok(form)
    }

    /// Only the active flag may change once orders exist
    pub async fn update_form(&self, id: i64, data: &FormUpsert) -> ServiceResult<Form> {
        let data = self.validated(data).await?;
        match self.store.replace_form(id, &data).await {
            Ok(form) => {
                tracing::info!(form_id = id, "Form replaced");
                Ok(form)
            }
            Err(RepoError::NotFound(_)) => Err(AppError::new(ErrorCode::FormNotFound).into()),
            Err(RepoError::Conflict(_)) => Err(AppError::new(ErrorCode::FormHasOrders)
                .with_detail("form_id", id)
                .into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Activating a form deactivates the other forms of its category
    pub async fn set_form_active(&self, id: i64, active: bool) -> ServiceResult<Form> {
        match self.store.set_form_active(id, active).await {
            Ok(form) => {
                tracing::info!(form_id = id, active, "Form activation changed");
                Ok(form)
            }
            Err(RepoError::NotFound(_)) => Err(AppError::new(ErrorCode::FormNotFound).into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Blocked while orders exist for the form
    pub async fn delete_form(&self, id: i64) -> ServiceResult<()> {
        match self.store.delete_form(id).await {
            Ok(()) => {
                tracing::info!(form_id = id, "Form deleted");
                Ok(())
            }
            Err(RepoError::NotFound(_)) => Err(AppError::new(ErrorCode::FormNotFound).into()),
            Err(RepoError::Conflict(_)) => Err(AppError::new(ErrorCode::FormHasOrders)
                .with_detail("form_id", id)
                .into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Check week, weekdays and referenced items; returns the normalized payload
    async fn validated(&self, data: &FormUpsert) -> ServiceResult<FormUpsert> {
        let week = data.week.trim();
        if week_start(week).is_none() {
            return Err(AppError::new(ErrorCode::InvalidWeek)
                .with_detail("week", week)
                .into());
        }

        let mut weekdays = HashSet::new();
        let mut options = Vec::with_capacity(data.options.len());
        for option in &data.options {
            if !weekdays.insert(option.weekday) {
                return Err(AppError::new(ErrorCode::DuplicateWeekday)
                    .with_detail("weekday", option.weekday.number())
                    .into());
            }
            let mut seen = HashSet::new();
            let mut food_item_ids = option.food_item_ids.clone();
            food_item_ids.retain(|id| seen.insert(*id));
            options.push(MenuOption {
                weekday: option.weekday,
                food_item_ids,
            });
        }
        options.sort_by_key(|o| o.weekday);

        let ids: Vec<i64> = options
            .iter()
            .flat_map(|o| o.food_item_ids.iter().copied())
            .collect();
        let found: HashMap<i64, FoodItem> = self
            .store
            .find_food_items(&ids)
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();
        for id in &ids {
            let Some(item) = found.get(id) else {
                return Err(AppError::new(ErrorCode::FoodItemNotFound)
                    .with_detail("food_item_id", *id)
                    .into());
            };
            if item.category != data.category {
                return Err(AppError::new(ErrorCode::FoodItemCategoryMismatch)
                    .with_detail("food_item_id", *id)
                    .into());
            }
        }

        Ok(FormUpsert {
            category: data.category,
            week: week.to_string(),
            active: data.active,
            options,
        })
    }
}
