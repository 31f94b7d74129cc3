use crate::{
    db::{self, DbPool},
    entities::inventory_item::{self, Category, Entity as InventoryItem, StorageLocation},
    errors::ServiceError,
};
use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};

pub const MAX_LOOKAHEAD_DAYS: i64 = 3650;

/// Optional narrowing of an expiration lookup.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, IntoParams)]
pub struct ExpirationFilter {
    pub category: Option<Category>,
    pub location: Option<StorageLocation>,
}

/// How pressing an expiring item is, from its days remaining.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpiryUrgency {
    Expired,
    DueToday,
    DueTomorrow,
    Upcoming,
}

impl ExpiryUrgency {
    pub fn from_days_remaining(days: i64) -> Self {
        match days {
            d if d < 0 => Self::Expired,
            0 => Self::DueToday,
            1 => Self::DueTomorrow,
            _ => Self::Upcoming,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExpiringItem {
    #[serde(flatten)]
    pub item: inventory_item::Model,
    /// Negative once the item has expired.
    pub days_remaining: i64,
    pub urgency: ExpiryUrgency,
}

#[derive(Clone)]
pub struct ExpirationService {
    db_pool: Arc<DbPool>,
    timeout: Duration,
}

impl ExpirationService {
    pub fn new(db_pool: Arc<DbPool>, timeout: Duration) -> Self {
        Self { db_pool, timeout }
    }

    pub async fn items_expiring_within(
        &self,
        lookahead_days: i64,
        filter: ExpirationFilter,
    ) -> Result<Vec<ExpiringItem>, ServiceError> {
        self.items_expiring_within_as_of(lookahead_days, filter, Utc::now().date_naive())
            .await
    }

    /// In-stock items whose expiration date is on or before
    /// `today + lookahead_days`, soonest first with ties broken by id.
    /// Already expired items are included.
    #[instrument(skip(self))]
    pub async fn items_expiring_within_as_of(
        &self,
        lookahead_days: i64,
        filter: ExpirationFilter,
        today: NaiveDate,
    ) -> Result<Vec<ExpiringItem>, ServiceError> {
        if !(0..=MAX_LOOKAHEAD_DAYS).contains(&lookahead_days) {
            return Err(ServiceError::ValidationError(format!(
                "lookahead_days must be between 0 and {}, got {}",
                MAX_LOOKAHEAD_DAYS, lookahead_days
            )));
        }
        let horizon = today
            .checked_add_days(Days::new(lookahead_days as u64))
            .ok_or_else(|| ServiceError::ValidationError("lookahead leaves the calendar".into()))?;

        let db = self.db_pool.as_ref();
        let items = db::with_timeout(self.timeout, "items_expiring_within", async move {
            let mut query = InventoryItem::find()
                .filter(inventory_item::Column::ExpirationDate.is_not_null())
                .filter(inventory_item::Column::ExpirationDate.lte(horizon))
                .filter(inventory_item::Column::Quantity.gt(Decimal::ZERO));
            if let Some(category) = filter.category {
                query = query.filter(inventory_item::Column::Category.eq(category));
            }
            if let Some(location) = filter.location {
                query = query.filter(inventory_item::Column::Location.eq(location));
            }
            Ok(query
                .order_by_asc(inventory_item::Column::ExpirationDate)
                .order_by_asc(inventory_item::Column::Id)
                .all(db)
                .await?)
        })
        .await?;

        debug!(count = items.len(), %horizon, "expiring items selected");
        Ok(items
            .into_iter()
            .filter_map(|item| {
                let days_remaining = item.days_until_expiration(today)?;
                Some(ExpiringItem {
                    item,
                    days_remaining,
                    urgency: ExpiryUrgency::from_days_remaining(days_remaining),
                })
            })
            .collect())
    }
}
