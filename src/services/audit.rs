use crate::{
    db::{self, DbPool},
    entities::operation_log::{self, Entity as OperationLog, OperationKind},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use utoipa::IntoParams;

pub const ITEMS_TABLE: &str = "inventory_items";
pub const TASKS_TABLE: &str = "tasks";

const DEFAULT_LOG_LIMIT: u64 = 50;
const MAX_LOG_LIMIT: u64 = 500;

/// Appends one audit row on the caller's connection, normally the
/// transaction of the mutation being audited.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    operation: OperationKind,
    target_table: &str,
    target_id: i32,
    actor: &str,
    details: Value,
) -> Result<operation_log::Model, ServiceError> {
    let entry = operation_log::ActiveModel {
        operation: Set(operation),
        target_table: Set(target_table.to_string()),
        target_id: Set(target_id),
        details: Set(details),
        actor: Set(actor.to_string()),
        logged_at: Set(Utc::now()),
        ..Default::default()
    };
    Ok(entry.insert(conn).await?)
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
pub struct OperationLogFilter {
    /// Restrict to one table, e.g. `inventory_items` or `tasks`
    pub target_table: Option<String>,
    pub target_id: Option<i32>,
    pub operation: Option<OperationKind>,
    /// Defaults to 50, capped at 500
    pub limit: Option<u64>,
}

#[derive(Clone)]
pub struct AuditService {
    db_pool: Arc<DbPool>,
    timeout: Duration,
}

impl AuditService {
    pub fn new(db_pool: Arc<DbPool>, timeout: Duration) -> Self {
        Self { db_pool, timeout }
    }

    /// Newest entries first.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: OperationLogFilter,
    ) -> Result<Vec<operation_log::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        db::with_timeout(self.timeout, "operation_log", async move {
            let mut query = OperationLog::find();
            if let Some(table) = filter.target_table {
                query = query.filter(operation_log::Column::TargetTable.eq(table));
            }
            if let Some(id) = filter.target_id {
                query = query.filter(operation_log::Column::TargetId.eq(id));
            }
            if let Some(kind) = filter.operation {
                query = query.filter(operation_log::Column::Operation.eq(kind));
            }
            let limit = filter
                .limit
                .unwrap_or(DEFAULT_LOG_LIMIT)
                .clamp(1, MAX_LOG_LIMIT);

            Ok(query
                .order_by_desc(operation_log::Column::LoggedAt)
                .order_by_desc(operation_log::Column::Id)
                .limit(limit)
                .all(db)
                .await?)
        })
        .await
    }
}
