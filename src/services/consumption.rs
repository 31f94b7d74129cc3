use crate::{
    db::{self, DbPool},
    entities::{
        consumption_event::{self, ConsumptionReason},
        inventory_item::{self, Entity as InventoryItem, Unit},
        operation_log::OperationKind,
    },
    errors::ServiceError,
    services::{
        audit::{self, ITEMS_TABLE},
        inventory,
    },
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    prelude::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request to take stock out of one inventory item.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ConsumeCommand {
    pub item_id: i32,
    pub quantity: Decimal,
    #[serde(default)]
    pub reason: ConsumptionReason,
    #[validate(length(max = 500))]
    pub note: Option<String>,
    /// Cap the consumption at the available stock instead of failing.
    #[serde(default)]
    pub force: bool,
}

/// Result of a successful consumption.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConsumptionOutcome {
    pub event: consumption_event::Model,
    pub item_name: String,
    pub unit: Unit,
    pub previous_quantity: Decimal,
    pub requested_quantity: Decimal,
    pub consumed_quantity: Decimal,
    pub remaining_quantity: Decimal,
    /// True when `force` reduced the requested amount.
    pub capped: bool,
    pub exhausted: bool,
}

/// Decides how much of `requested` may be taken from `available`.
fn applied_quantity(
    item_id: i32,
    requested: Decimal,
    available: Decimal,
    force: bool,
) -> Result<Decimal, ServiceError> {
    if requested > available && !force {
        return Err(ServiceError::InsufficientStock {
            item_id,
            requested,
            available,
        });
    }
    let applied = requested.min(available);
    if applied <= Decimal::ZERO {
        return Err(ServiceError::InsufficientStock {
            item_id,
            requested,
            available,
        });
    }
    Ok(applied)
}

#[derive(Clone)]
pub struct ConsumptionService {
    db_pool: Arc<DbPool>,
    timeout: Duration,
}

impl ConsumptionService {
    pub fn new(db_pool: Arc<DbPool>, timeout: Duration) -> Self {
        Self { db_pool, timeout }
    }

    /// Decrements stock, records the event and appends the audit entry in
    /// one transaction.
    ///
    /// The item row is locked for the duration and the decrement only
    /// applies while `quantity >= consumed`; losing that race yields
    /// `ConstraintViolation`.
    #[instrument(skip(self, command), fields(item_id = command.item_id, quantity = %command.quantity))]
    pub async fn consume(
        &self,
        command: ConsumeCommand,
        actor: &str,
    ) -> Result<ConsumptionOutcome, ServiceError> {
        command.validate()?;
        inventory::validate_quantity(command.quantity, false)?;

        let actor = actor.to_string();
        let result = db::transactional(self.db_pool.as_ref(), self.timeout, "consume", move |txn| {
            Box::pin(async move {
                let item_id = command.item_id;
                let item = InventoryItem::find_by_id(item_id)
                    .lock_exclusive()
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Inventory item {} not found", item_id))
                    })?;

                let previous = item.quantity;
                let applied = applied_quantity(item_id, command.quantity, previous, command.force)?;
                let remaining = previous - applied;
                let now = Utc::now();

                let updated = InventoryItem::update_many()
                    .col_expr(inventory_item::Column::Quantity, Expr::value(remaining))
                    .col_expr(inventory_item::Column::UpdatedAt, Expr::value(now))
                    .col_expr(inventory_item::Column::UpdatedBy, Expr::value(actor.clone()))
                    .filter(inventory_item::Column::Id.eq(item_id))
                    .filter(inventory_item::Column::Quantity.gte(applied))
                    .exec(txn)
                    .await?;
                if updated.rows_affected == 0 {
                    return Err(ServiceError::ConstraintViolation(format!(
                        "stock of item {} changed concurrently",
                        item_id
                    )));
                }

                let event = consumption_event::ActiveModel {
                    item_id: Set(item_id),
                    quantity: Set(applied),
                    consumed_at: Set(now),
                    reason: Set(command.reason),
                    note: Set(command.note.clone()),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                let capped = applied < command.quantity;
                audit::record(
                    txn,
                    OperationKind::Consume,
                    ITEMS_TABLE,
                    item_id,
                    &actor,
                    json!({
                        "event_id": event.id,
                        "previous_quantity": previous,
                        "requested_quantity": command.quantity,
                        "consumed_quantity": applied,
                        "remaining_quantity": remaining,
                        "reason": command.reason,
                        "forced": command.force,
                        "capped": capped,
                    }),
                )
                .await?;

                Ok(ConsumptionOutcome {
                    event,
                    item_name: item.name,
                    unit: item.unit,
                    previous_quantity: previous,
                    requested_quantity: command.quantity,
                    consumed_quantity: applied,
                    remaining_quantity: remaining,
                    capped,
                    exhausted: remaining.is_zero(),
                })
            })
        })
        .await;

        match &result {
            Ok(outcome) => {
                counter!("pantry_ledger.consumptions", 1, "reason" => outcome.event.reason.to_string());
                info!(
                    consumed = %outcome.consumed_quantity,
                    remaining = %outcome.remaining_quantity,
                    capped = outcome.capped,
                    "stock consumed"
                );
            }
            Err(e) => {
                counter!("pantry_ledger.consumptions.rejected", 1, "code" => e.code());
                warn!(error = %e, "consumption rejected");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn within_stock_is_applied_as_requested() {
        assert_eq!(applied_quantity(1, dec!(2), dec!(5), false).unwrap(), dec!(2));
        assert_eq!(applied_quantity(1, dec!(5), dec!(5), false).unwrap(), dec!(5));
    }

    #[test]
    fn over_stock_without_force_is_rejected() {
        assert_matches!(
            applied_quantity(7, dec!(6), dec!(5), false),
            Err(ServiceError::InsufficientStock { item_id: 7, requested, available })
                if requested == dec!(6) && available == dec!(5)
        );
    }

    #[test]
    fn force_caps_at_available() {
        assert_eq!(applied_quantity(1, dec!(8), dec!(2.5), true).unwrap(), dec!(2.5));
    }

    #[test]
    fn force_on_empty_stock_is_rejected() {
        assert_matches!(
            applied_quantity(1, dec!(1), Decimal::ZERO, true),
            Err(ServiceError::InsufficientStock { .. })
        );
    }
}
