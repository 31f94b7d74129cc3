//! Tool catalog and dispatcher behind the JSON-RPC endpoint.
//!
//! Each tool maps one-to-one onto a service operation. Arguments arrive as a
//! JSON object, are decoded into the same request types the REST layer uses,
//! and the service result is returned as JSON.

pub mod rpc;

use crate::{
    entities::{Category, StorageLocation, TaskStatus},
    errors::ServiceError,
    handlers::AppServices,
    middleware_helpers::Actor,
    services::{
        audit::OperationLogFilter,
        consumption::ConsumeCommand,
        expiration::ExpirationFilter,
        inventory::{ItemUpdate, NewItem, StockFilter},
        statistics::{ConsumptionStatsQuery, TaskStatsQuery},
        tasks::{NewTask, TaskFilter, TaskUpdate},
    },
};
use metrics::counter;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Every tool the dispatcher exposes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ToolName {
    AddItem,
    UpdateItem,
    GetItem,
    ListItems,
    ConsumeItem,
    ConsumptionHistory,
    ExpiringItems,
    ConsumptionStats,
    InsertTask,
    UpdateTask,
    ListTasks,
    UpdateTaskStatus,
    CompleteTask,
    CancelTask,
    TaskStats,
    Search,
    Fetch,
    OperationLog,
}

const ITEM_ENUMS: &str = "unit: PIECES|KG|LITERS|GRAMS; category: DAIRY|VEGETABLES|FRUIT|MEAT|FISH|PRESERVES|BEVERAGES|OTHER; location: FRIDGE|FREEZER|PANTRY|CELLAR";

fn object(properties: Value, required: &[&str]) -> Value {
    json!({ "type": "object", "properties": properties, "required": required })
}

impl ToolName {
    pub fn description(self) -> String {
        match self {
            ToolName::AddItem => format!("Add an item to the pantry. Quantity must be positive. {}", ITEM_ENUMS),
            ToolName::UpdateItem => "Partially update an item; at least one field besides item_id".into(),
            ToolName::GetItem => "Get one inventory item by id".into(),
            ToolName::ListItems => {
                "Stock overview with expiry alerts and summary counts".into()
            }
            ToolName::ConsumeItem => {
                "Consume stock from an item. Fails when stock is insufficient unless force caps it".into()
            }
            ToolName::ConsumptionHistory => "Consumption events of one item, newest first".into(),
            ToolName::ExpiringItems => {
                "In-stock items expiring within `days` (default 7), soonest first, with days remaining".into()
            }
            ToolName::ConsumptionStats => {
                "Consumption totals grouped by category, reason or total over a date window".into()
            }
            ToolName::InsertTask => "Create a task, optionally recurring DAILY, WEEKLY or MONTHLY".into(),
            ToolName::UpdateTask => "Edit a task's title, description, priority, due date, assignee or recurrence".into(),
            ToolName::ListTasks => "List tasks by status, priority, assignee, due window or recurrence".into(),
            ToolName::UpdateTaskStatus => {
                "Move a task to TODO, IN_PROGRESS, DONE or CANCELLED following the lifecycle".into()
            }
            ToolName::CompleteTask => {
                "Mark a task done; recurring tasks get their next occurrence scheduled".into()
            }
            ToolName::CancelTask => "Cancel an open task with an optional reason".into(),
            ToolName::TaskStats => "Task counts grouped by status, priority or assignee over a date window".into(),
            ToolName::Search => "Search items and tasks by free text".into(),
            ToolName::Fetch => "Fetch a full document by search id (item-<id> or task-<id>)".into(),
            ToolName::OperationLog => "Audit trail of changes, newest first".into(),
        }
    }

    pub fn input_schema(self) -> Value {
        let date = json!({ "type": "string", "format": "date" });
        let decimal = json!({ "type": ["number", "string"] });
        let item_id = json!({ "item_id": { "type": "integer" } });
        let task_id = json!({ "task_id": { "type": "integer" } });
        let window = json!({ "start": date, "end": date });

        match self {
            ToolName::AddItem => object(
                json!({
                    "name": { "type": "string" },
                    "quantity": decimal,
                    "unit": { "type": "string" },
                    "category": { "type": "string" },
                    "location": { "type": "string" },
                    "expiration_date": date,
                    "opened_date": date,
                    "purchase_price": decimal,
                    "supplier": { "type": "string" },
                    "lot_code": { "type": "string" }
                }),
                &["name", "quantity", "unit", "category", "location"],
            ),
            ToolName::UpdateItem => object(
                json!({
                    "item_id": { "type": "integer" },
                    "name": { "type": "string" },
                    "quantity": decimal,
                    "unit": { "type": "string" },
                    "category": { "type": "string" },
                    "location": { "type": "string" },
                    "expiration_date": date,
                    "opened_date": date,
                    "purchase_price": decimal,
                    "supplier": { "type": "string" },
                    "lot_code": { "type": "string" }
                }),
                &["item_id"],
            ),
            ToolName::GetItem => object(item_id, &["item_id"]),
            ToolName::ListItems => object(
                json!({
                    "category": { "type": "string" },
                    "location": { "type": "string" },
                    "expiring_within_days": { "type": "integer" },
                    "min_quantity": decimal,
                    "include_exhausted": { "type": "boolean" },
                    "limit": { "type": "integer" }
                }),
                &[],
            ),
            ToolName::ConsumeItem => object(
                json!({
                    "item_id": { "type": "integer" },
                    "quantity": decimal,
                    "reason": { "type": "string", "enum": ["CONSUMED", "EXPIRED", "DISCARDED"] },
                    "note": { "type": "string" },
                    "force": { "type": "boolean" }
                }),
                &["item_id", "quantity"],
            ),
            ToolName::ConsumptionHistory => object(
                json!({ "item_id": { "type": "integer" }, "limit": { "type": "integer" } }),
                &["item_id"],
            ),
            ToolName::ExpiringItems => object(
                json!({
                    "days": { "type": "integer", "minimum": 0, "maximum": 3650 },
                    "category": { "type": "string" },
                    "location": { "type": "string" }
                }),
                &[],
            ),
            ToolName::ConsumptionStats => {
                let mut props = window;
                props["group_by"] = json!({ "type": "string", "enum": ["category", "reason", "total"] });
                object(props, &[])
            }
            ToolName::InsertTask => object(
                json!({
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "priority": { "type": "string", "enum": ["HIGH", "MEDIUM", "LOW"] },
                    "due_date": date,
                    "assignee": { "type": "string" },
                    "recurring": { "type": "boolean" },
                    "recurrence": { "type": "string", "enum": ["DAILY", "WEEKLY", "MONTHLY"] }
                }),
                &["title"],
            ),
            ToolName::UpdateTask => object(
                json!({
                    "task_id": { "type": "integer" },
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "priority": { "type": "string", "enum": ["HIGH", "MEDIUM", "LOW"] },
                    "due_date": date,
                    "assignee": { "type": "string" },
                    "recurring": { "type": "boolean" },
                    "recurrence": { "type": "string", "enum": ["DAILY", "WEEKLY", "MONTHLY"] }
                }),
                &["task_id"],
            ),
            ToolName::ListTasks => object(
                json!({
                    "status": { "type": "string", "enum": ["TODO", "IN_PROGRESS", "DONE", "CANCELLED"] },
                    "priority": { "type": "string", "enum": ["HIGH", "MEDIUM", "LOW"] },
                    "assignee": { "type": "string" },
                    "due_within_days": { "type": "integer" },
                    "recurring_only": { "type": "boolean" },
                    "limit": { "type": "integer" }
                }),
                &[],
            ),
            ToolName::UpdateTaskStatus => object(
                json!({
                    "task_id": { "type": "integer" },
                    "status": { "type": "string", "enum": ["TODO", "IN_PROGRESS", "DONE", "CANCELLED"] }
                }),
                &["task_id", "status"],
            ),
            ToolName::CompleteTask => object(task_id, &["task_id"]),
            ToolName::CancelTask => object(
                json!({ "task_id": { "type": "integer" }, "reason": { "type": "string" } }),
                &["task_id"],
            ),
            ToolName::TaskStats => {
                let mut props = window;
                props["group_by"] = json!({ "type": "string", "enum": ["status", "priority", "assignee"] });
                object(props, &[])
            }
            ToolName::Search => object(json!({ "query": { "type": "string" } }), &["query"]),
            ToolName::Fetch => object(json!({ "id": { "type": "string" } }), &["id"]),
            ToolName::OperationLog => object(
                json!({
                    "target_table": { "type": "string", "enum": ["inventory_items", "tasks"] },
                    "target_id": { "type": "integer" },
                    "operation": { "type": "string" },
                    "limit": { "type": "integer" }
                }),
                &[],
            ),
        }
    }
}

/// Entry of the `tools/list` result.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

pub fn catalog() -> Vec<ToolDescriptor> {
    use strum::IntoEnumIterator;
    ToolName::iter()
        .map(|tool| ToolDescriptor {
            name: tool.to_string(),
            description: tool.description(),
            input_schema: tool.input_schema(),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ItemRef {
    item_id: i32,
}

#[derive(Debug, Deserialize)]
struct TaskRef {
    task_id: i32,
}

#[derive(Debug, Deserialize)]
struct UpdateItemArgs {
    item_id: i32,
    #[serde(flatten)]
    changes: ItemUpdate,
}

#[derive(Debug, Deserialize)]
struct HistoryArgs {
    item_id: i32,
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ExpiringArgs {
    days: Option<i64>,
    category: Option<Category>,
    location: Option<StorageLocation>,
}

#[derive(Debug, Deserialize)]
struct UpdateTaskArgs {
    task_id: i32,
    #[serde(flatten)]
    changes: TaskUpdate,
}

#[derive(Debug, Deserialize)]
struct StatusArgs {
    task_id: i32,
    status: TaskStatus,
}

#[derive(Debug, Deserialize)]
struct CancelArgs {
    task_id: i32,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
struct FetchArgs {
    id: String,
}

fn decode<T: DeserializeOwned>(tool: ToolName, arguments: Value) -> Result<T, ServiceError> {
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other,
    };
    serde_json::from_value(arguments)
        .map_err(|e| ServiceError::ValidationError(format!("invalid arguments for {}: {}", tool, e)))
}

fn encode<T: Serialize>(value: T) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::InternalError(e.to_string()))
}

/// Routes tool calls to the ledger services.
#[derive(Clone)]
pub struct ToolDispatcher {
    services: AppServices,
    default_lookahead_days: i64,
}

impl ToolDispatcher {
    pub fn new(services: AppServices) -> Self {
        Self {
            services,
            default_lookahead_days: crate::handlers::items::DEFAULT_LOOKAHEAD_DAYS,
        }
    }

    pub fn resolve(name: &str) -> Option<ToolName> {
        ToolName::from_str(name).ok()
    }

    /// Runs one tool on behalf of `actor`.
    #[instrument(skip(self, arguments, actor), fields(tool = %tool, actor = %actor.as_str()))]
    pub async fn call(
        &self,
        tool: ToolName,
        arguments: Value,
        actor: &Actor,
    ) -> Result<Value, ServiceError> {
        let start = Instant::now();
        let result = self.dispatch(tool, arguments, actor.as_str()).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => {
                counter!("pantry_tools.calls", 1, "tool" => tool.as_ref().to_string(), "outcome" => "ok");
                info!(?elapsed, "tool call succeeded");
            }
            Err(e) => {
                counter!("pantry_tools.calls", 1, "tool" => tool.as_ref().to_string(), "outcome" => e.code());
                warn!(?elapsed, error = %e, "tool call failed");
            }
        }
        result
    }

    async fn dispatch(
        &self,
        tool: ToolName,
        arguments: Value,
        actor: &str,
    ) -> Result<Value, ServiceError> {
        let s = &self.services;
        match tool {
            ToolName::AddItem => {
                let input: NewItem = decode(tool, arguments)?;
                encode(s.inventory.add_item(input, actor).await?)
            }
            ToolName::UpdateItem => {
                let args: UpdateItemArgs = decode(tool, arguments)?;
                encode(s.inventory.update_item(args.item_id, args.changes, actor).await?)
            }
            ToolName::GetItem => {
                let args: ItemRef = decode(tool, arguments)?;
                encode(s.inventory.get_item(args.item_id).await?)
            }
            ToolName::ListItems => {
                let filter: StockFilter = decode(tool, arguments)?;
                encode(s.inventory.list_items(filter).await?)
            }
            ToolName::ConsumeItem => {
                let command: ConsumeCommand = decode(tool, arguments)?;
                encode(s.consumption.consume(command, actor).await?)
            }
            ToolName::ConsumptionHistory => {
                let args: HistoryArgs = decode(tool, arguments)?;
                encode(s.inventory.consumption_history(args.item_id, args.limit).await?)
            }
            ToolName::ExpiringItems => {
                let args: ExpiringArgs = decode(tool, arguments)?;
                let filter = ExpirationFilter {
                    category: args.category,
                    location: args.location,
                };
                encode(
                    s.expiration
                        .items_expiring_within(args.days.unwrap_or(self.default_lookahead_days), filter)
                        .await?,
                )
            }
            ToolName::ConsumptionStats => {
                let query: ConsumptionStatsQuery = decode(tool, arguments)?;
                let window = s.statistics.resolve_window(query.start, query.end)?;
                encode(
                    s.statistics
                        .consumption_stats(window, query.group_by.unwrap_or_default())
                        .await?,
                )
            }
            ToolName::InsertTask => {
                let input: NewTask = decode(tool, arguments)?;
                encode(s.tasks.create(input, actor).await?)
            }
            ToolName::UpdateTask => {
                let args: UpdateTaskArgs = decode(tool, arguments)?;
                encode(s.tasks.update(args.task_id, args.changes, actor).await?)
            }
            ToolName::ListTasks => {
                let filter: TaskFilter = decode(tool, arguments)?;
                encode(s.tasks.list(filter).await?)
            }
            ToolName::UpdateTaskStatus => {
                let args: StatusArgs = decode(tool, arguments)?;
                encode(s.tasks.update_status(args.task_id, args.status, actor).await?)
            }
            ToolName::CompleteTask => {
                let args: TaskRef = decode(tool, arguments)?;
                encode(s.tasks.complete(args.task_id, actor).await?)
            }
            ToolName::CancelTask => {
                let args: CancelArgs = decode(tool, arguments)?;
                encode(s.tasks.cancel(args.task_id, args.reason, actor).await?)
            }
            ToolName::TaskStats => {
                let query: TaskStatsQuery = decode(tool, arguments)?;
                let window = s.statistics.resolve_window(query.start, query.end)?;
                encode(
                    s.statistics
                        .task_stats(window, query.group_by.unwrap_or_default())
                        .await?,
                )
            }
            ToolName::Search => {
                let args: SearchArgs = decode(tool, arguments)?;
                let hits = s.search.search(&args.query).await?;
                Ok(json!({ "results": hits }))
            }
            ToolName::Fetch => {
                let args: FetchArgs = decode(tool, arguments)?;
                encode(s.search.fetch(&args.id).await?)
            }
            ToolName::OperationLog => {
                let filter: OperationLogFilter = decode(tool, arguments)?;
                encode(s.audit.list(filter).await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_round_trip_through_strings() {
        assert_eq!(ToolDispatcher::resolve("consume_item"), Some(ToolName::ConsumeItem));
        assert_eq!(ToolName::UpdateTaskStatus.to_string(), "update_task_status");
        assert_eq!(ToolDispatcher::resolve("drop_table"), None);
    }

    #[test]
    fn catalog_lists_every_tool_with_object_schema() {
        let tools = catalog();
        assert_eq!(tools.len(), 18);
        for tool in &tools {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            assert!(!tool.description.is_empty());
        }
    }

    #[test]
    fn bad_arguments_are_validation_errors() {
        let err = decode::<ItemRef>(ToolName::GetItem, json!({ "item_id": "seven" })).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let args: UpdateItemArgs =
            decode(ToolName::UpdateItem, json!({ "item_id": 4, "supplier": "Dairy co-op" })).unwrap();
        assert_eq!(args.item_id, 4);
        assert_eq!(args.changes.supplier.as_deref(), Some("Dairy co-op"));
    }
}
