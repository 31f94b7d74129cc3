use crate::{
    db::{self, DbPool},
    entities::{
        consumption_event::{self, Entity as ConsumptionEvent},
        inventory_item::{self, Category, Entity as InventoryItem, StorageLocation, Unit},
        operation_log::OperationKind,
    },
    errors::ServiceError,
    services::audit::{self, ITEMS_TABLE},
};
use chrono::{Days, NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    prelude::Expr, sea_query::NullOrdering, ActiveModelTrait, ColumnTrait, EntityTrait,
    IntoActiveModel, Order, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

const DEFAULT_LIST_LIMIT: u64 = 50;
const MAX_LIST_LIMIT: u64 = 500;

/// Input for creating a new inventory item.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct NewItem {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub quantity: Decimal,
    pub unit: Unit,
    pub category: Category,
    pub location: StorageLocation,
    pub expiration_date: Option<NaiveDate>,
    pub opened_date: Option<NaiveDate>,
    pub purchase_price: Option<Decimal>,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    #[validate(length(max = 100))]
    pub lot_code: Option<String>,
}

/// Partial edit; at least one field must be present.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct ItemUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit: Option<Unit>,
    pub category: Option<Category>,
    pub location: Option<StorageLocation>,
    pub expiration_date: Option<NaiveDate>,
    pub opened_date: Option<NaiveDate>,
    pub purchase_price: Option<Decimal>,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    #[validate(length(max = 100))]
    pub lot_code: Option<String>,
}

impl ItemUpdate {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.quantity.is_none()
            && self.unit.is_none()
            && self.category.is_none()
            && self.location.is_none()
            && self.expiration_date.is_none()
            && self.opened_date.is_none()
            && self.purchase_price.is_none()
            && self.supplier.is_none()
            && self.lot_code.is_none()
    }
}

/// Stock overview filters. All present filters combine conjunctively.
#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct StockFilter {
    pub category: Option<Category>,
    pub location: Option<StorageLocation>,
    /// Only items expiring within this many days (expired ones included)
    pub expiring_within_days: Option<i64>,
    /// Only items with at least this much stock
    pub min_quantity: Option<Decimal>,
    /// Include items whose stock reached zero
    #[serde(default)]
    pub include_exhausted: bool,
    /// Defaults to 50, capped at 500
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpiryAlert {
    Expired,
    ExpiringSoon,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockEntry {
    #[serde(flatten)]
    pub item: inventory_item::Model,
    pub days_until_expiration: Option<i64>,
    pub alert: Option<ExpiryAlert>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockSummary {
    pub total_items: usize,
    pub expired: usize,
    pub expiring_soon: usize,
    pub categories: usize,
    pub locations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockOverview {
    pub items: Vec<StockEntry>,
    pub summary: StockSummary,
}

fn alert_for(days: Option<i64>, soon_days: i64) -> Option<ExpiryAlert> {
    match days {
        Some(d) if d < 0 => Some(ExpiryAlert::Expired),
        Some(d) if d <= soon_days => Some(ExpiryAlert::ExpiringSoon),
        _ => None,
    }
}

/// Trailing zeros are accepted; significant digits past `scale` are not,
/// since the column would round them away.
fn check_scale(field: &str, value: Decimal, scale: u32) -> Result<(), ServiceError> {
    if value.normalize().scale() > scale {
        return Err(ServiceError::ValidationError(format!(
            "{} allows at most {} decimal places, got {}",
            field, scale, value
        )));
    }
    Ok(())
}

pub(crate) fn validate_quantity(quantity: Decimal, allow_zero: bool) -> Result<(), ServiceError> {
    if quantity < Decimal::ZERO || (!allow_zero && quantity.is_zero()) {
        let bound = if allow_zero { "non-negative" } else { "positive" };
        return Err(ServiceError::ValidationError(format!(
            "quantity must be {}, got {}",
            bound, quantity
        )));
    }
    check_scale("quantity", quantity, inventory_item::QUANTITY_SCALE)
}

fn validate_price(price: Option<Decimal>) -> Result<(), ServiceError> {
    match price {
        Some(p) if p < Decimal::ZERO => Err(ServiceError::ValidationError(format!(
            "purchase_price must be non-negative, got {}",
            p
        ))),
        Some(p) => check_scale("purchase_price", p, inventory_item::PRICE_SCALE),
        None => Ok(()),
    }
}

fn validate_opened_date(opened: Option<NaiveDate>, created: NaiveDate) -> Result<(), ServiceError> {
    match opened {
        Some(date) if date < created => Err(ServiceError::ValidationError(format!(
            "opened_date {} is before the item's creation date {}",
            date, created
        ))),
        _ => Ok(()),
    }
}

/// Service for the inventory ledger: creation, edits and stock views.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    timeout: Duration,
    expiring_soon_days: i64,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, timeout: Duration, expiring_soon_days: i64) -> Self {
        Self {
            db_pool,
            timeout,
            expiring_soon_days,
        }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn add_item(
        &self,
        input: NewItem,
        actor: &str,
    ) -> Result<inventory_item::Model, ServiceError> {
        input.validate()?;
        validate_quantity(input.quantity, false)?;
        validate_price(input.purchase_price)?;
        let now = Utc::now();
        validate_opened_date(input.opened_date, now.date_naive())?;

        let actor = actor.to_string();
        let item = db::transactional(self.db_pool.as_ref(), self.timeout, "add_item", move |txn| {
            Box::pin(async move {
                let model = inventory_item::ActiveModel {
                    name: Set(input.name.trim().to_string()),
                    quantity: Set(input.quantity),
                    unit: Set(input.unit),
                    category: Set(input.category),
                    location: Set(input.location),
                    expiration_date: Set(input.expiration_date),
                    opened_date: Set(input.opened_date),
                    purchase_price: Set(input.purchase_price),
                    supplier: Set(input.supplier),
                    lot_code: Set(input.lot_code),
                    created_at: Set(now),
                    updated_at: Set(now),
                    updated_by: Set(actor.clone()),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                audit::record(
                    txn,
                    OperationKind::Insert,
                    ITEMS_TABLE,
                    model.id,
                    &actor,
                    json!({
                        "name": model.name,
                        "quantity": model.quantity,
                        "unit": model.unit,
                        "category": model.category,
                        "location": model.location,
                        "expiration_date": model.expiration_date,
                    }),
                )
                .await?;

                Ok(model)
            })
        })
        .await?;

        counter!("pantry_ledger.items.created", 1);
        info!(item_id = item.id, "inventory item added");
        Ok(item)
    }

    /// Applies a partial edit. The audit entry records previous and new values
    /// of every field that actually changed.
    #[instrument(skip(self, changes))]
    pub async fn update_item(
        &self,
        item_id: i32,
        changes: ItemUpdate,
        actor: &str,
    ) -> Result<inventory_item::Model, ServiceError> {
        if changes.is_empty() {
            return Err(ServiceError::ValidationError(
                "at least one field must be provided".into(),
            ));
        }
        changes.validate()?;
        if let Some(quantity) = changes.quantity {
            validate_quantity(quantity, true)?;
        }
        validate_price(changes.purchase_price)?;

        let actor = actor.to_string();
        let item = db::transactional(self.db_pool.as_ref(), self.timeout, "update_item", move |txn| {
            Box::pin(async move {
                let current = InventoryItem::find_by_id(item_id)
                    .lock_exclusive()
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Inventory item {} not found", item_id))
                    })?;
                validate_opened_date(changes.opened_date, current.created_at.date_naive())?;

                let mut diff = Map::new();
                let mut active = current.clone().into_active_model();

                macro_rules! apply {
                    ($field:ident) => {
                        if let Some(value) = changes.$field.clone() {
                            if current.$field != value {
                                diff.insert(
                                    stringify!($field).to_string(),
                                    json!({ "from": current.$field, "to": value }),
                                );
                                active.$field = Set(value);
                            }
                        }
                    };
                    (optional $field:ident) => {
                        if let Some(value) = changes.$field.clone() {
                            if current.$field.as_ref() != Some(&value) {
                                diff.insert(
                                    stringify!($field).to_string(),
                                    json!({ "from": current.$field, "to": value }),
                                );
                                active.$field = Set(Some(value));
                            }
                        }
                    };
                }

                apply!(name);
                apply!(quantity);
                apply!(unit);
                apply!(category);
                apply!(location);
                apply!(optional expiration_date);
                apply!(optional opened_date);
                apply!(optional purchase_price);
                apply!(optional supplier);
                apply!(optional lot_code);

                if diff.is_empty() {
                    return Ok(current);
                }

                active.updated_at = Set(Utc::now());
                active.updated_by = Set(actor.clone());
                let updated = active.update(txn).await?;

                audit::record(
                    txn,
                    OperationKind::Update,
                    ITEMS_TABLE,
                    item_id,
                    &actor,
                    Value::Object(diff),
                )
                .await?;

                Ok(updated)
            })
        })
        .await?;

        info!(item_id, "inventory item updated");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, item_id: i32) -> Result<inventory_item::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        db::with_timeout(self.timeout, "get_item", async move {
            InventoryItem::find_by_id(item_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Inventory item {} not found", item_id)))
        })
        .await
    }

    /// Stock overview as of today.
    pub async fn list_items(&self, filter: StockFilter) -> Result<StockOverview, ServiceError> {
        self.list_items_as_of(filter, Utc::now().date_naive()).await
    }

    /// Stock overview relative to `today`: soonest expiration first (undated
    /// items last), then by name. The summary covers every matching item,
    /// not just the returned page.
    #[instrument(skip(self))]
    pub async fn list_items_as_of(
        &self,
        filter: StockFilter,
        today: NaiveDate,
    ) -> Result<StockOverview, ServiceError> {
        if let Some(days) = filter.expiring_within_days {
            if !(0..=3650).contains(&days) {
                return Err(ServiceError::ValidationError(format!(
                    "expiring_within_days must be between 0 and 3650, got {}",
                    days
                )));
            }
        }
        if let Some(min) = filter.min_quantity {
            validate_quantity(min, true)?;
        }

        let db = self.db_pool.as_ref();
        let soon_days = self.expiring_soon_days;
        db::with_timeout(self.timeout, "list_items", async move {
            let mut query = InventoryItem::find();
            if !filter.include_exhausted {
                query = query.filter(inventory_item::Column::Quantity.gt(Decimal::ZERO));
            }
            if let Some(category) = filter.category {
                query = query.filter(inventory_item::Column::Category.eq(category));
            }
            if let Some(location) = filter.location {
                query = query.filter(inventory_item::Column::Location.eq(location));
            }
            if let Some(min) = filter.min_quantity {
                query = query.filter(inventory_item::Column::Quantity.gte(min));
            }
            if let Some(days) = filter.expiring_within_days {
                let horizon = today
                    .checked_add_days(Days::new(days as u64))
                    .ok_or_else(|| ServiceError::ValidationError("date out of range".into()))?;
                query = query
                    .filter(inventory_item::Column::ExpirationDate.is_not_null())
                    .filter(inventory_item::Column::ExpirationDate.lte(horizon));
            }

            let rows = query
                .order_by_with_nulls(
                    inventory_item::Column::ExpirationDate,
                    Order::Asc,
                    NullOrdering::Last,
                )
                .order_by_asc(inventory_item::Column::Name)
                .order_by_asc(inventory_item::Column::Id)
                .all(db)
                .await?;

            let mut summary = StockSummary {
                total_items: rows.len(),
                ..Default::default()
            };
            let mut categories = BTreeSet::new();
            let mut locations = BTreeSet::new();
            let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT) as usize;
            let mut items = Vec::with_capacity(rows.len().min(limit));

            for item in rows {
                let days = item.days_until_expiration(today);
                let alert = alert_for(days, soon_days);
                match alert {
                    Some(ExpiryAlert::Expired) => summary.expired += 1,
                    Some(ExpiryAlert::ExpiringSoon) => summary.expiring_soon += 1,
                    None => {}
                }
                categories.insert(item.category);
                locations.insert(item.location);
                if items.len() < limit {
                    items.push(StockEntry {
                        item,
                        days_until_expiration: days,
                        alert,
                    });
                }
            }
            summary.categories = categories.len();
            summary.locations = locations.len();

            Ok(StockOverview { items, summary })
        })
        .await
    }

    /// Consumption events of one item, newest first.
    #[instrument(skip(self))]
    pub async fn consumption_history(
        &self,
        item_id: i32,
        limit: Option<u64>,
    ) -> Result<Vec<consumption_event::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        db::with_timeout(self.timeout, "consumption_history", async move {
            if InventoryItem::find_by_id(item_id).one(db).await?.is_none() {
                return Err(ServiceError::NotFound(format!(
                    "Inventory item {} not found",
                    item_id
                )));
            }
            Ok(ConsumptionEvent::find()
                .filter(consumption_event::Column::ItemId.eq(item_id))
                .order_by_desc(consumption_event::Column::ConsumedAt)
                .order_by_desc(consumption_event::Column::Id)
                .limit(limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT))
                .all(db)
                .await?)
        })
        .await
    }

    /// Case-insensitive substring match over name, category and location.
    pub async fn search(
        &self,
        term: &str,
        limit: u64,
    ) -> Result<Vec<inventory_item::Model>, ServiceError> {
        let pattern = format!("%{}%", term.trim().to_lowercase());
        let db = self.db_pool.as_ref();
        db::with_timeout(self.timeout, "search_items", async move {
            let lower = |col: inventory_item::Column| {
                Expr::expr(sea_orm::sea_query::Func::lower(Expr::col(col)))
            };
            Ok(InventoryItem::find()
                .filter(
                    lower(inventory_item::Column::Name)
                        .like(pattern.as_str())
                        .or(lower(inventory_item::Column::Category).like(pattern.as_str()))
                        .or(lower(inventory_item::Column::Location).like(pattern.as_str())),
                )
                .order_by_asc(inventory_item::Column::Name)
                .limit(limit)
                .all(db)
                .await?)
        })
        .await
    }
}
