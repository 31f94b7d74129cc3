use crate::{
    errors::ServiceError,
    services::{inventory::InventoryService, tasks::TaskService},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use utoipa::ToSchema;

const ITEM_RESULTS: u64 = 10;
const TASK_RESULTS: u64 = 5;

/// Reference to one document, rendered as `item-{id}` or `task-{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentRef {
    Item(i32),
    Task(i32),
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentRef::Item(id) => write!(f, "item-{}", id),
            DocumentRef::Task(id) => write!(f, "task-{}", id),
        }
    }
}

impl std::str::FromStr for DocumentRef {
    type Err = ServiceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid =
            || ServiceError::ValidationError(format!("'{}' is not of the form item-<id> or task-<id>", raw));
        let (kind, id) = raw.trim().split_once('-').ok_or_else(invalid)?;
        let id: i32 = id.parse().map_err(|_| invalid())?;
        match kind {
            "item" => Ok(DocumentRef::Item(id)),
            "task" => Ok(DocumentRef::Task(id)),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub text: String,
    pub metadata: Value,
}

/// Free-text lookup across both ledgers.
#[derive(Clone)]
pub struct SearchService {
    inventory: InventoryService,
    tasks: TaskService,
}

impl SearchService {
    pub fn new(inventory: InventoryService, tasks: TaskService) -> Self {
        Self { inventory, tasks }
    }

    /// Up to ten matching items followed by up to five matching tasks.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ServiceError> {
        if query.trim().is_empty() {
            return Err(ServiceError::ValidationError("query must not be blank".into()));
        }

        let items = self.inventory.search(query, ITEM_RESULTS).await?;
        let tasks = self.tasks.search(query, TASK_RESULTS).await?;

        let mut hits = Vec::with_capacity(items.len() + tasks.len());
        hits.extend(items.into_iter().map(|item| SearchHit {
            id: DocumentRef::Item(item.id).to_string(),
            snippet: format!(
                "{} {} in {} ({}), expires {}",
                item.quantity.normalize(),
                item.unit,
                item.location,
                item.category,
                item.expiration_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "never".into())
            ),
            title: item.name,
        }));
        hits.extend(tasks.into_iter().map(|task| SearchHit {
            id: DocumentRef::Task(task.id).to_string(),
            snippet: format!(
                "{} priority {}, status {}",
                task.priority,
                task.due_date
                    .map(|d| format!("due {}", d))
                    .unwrap_or_else(|| "no due date".into()),
                task.status
            ),
            title: task.title,
        }));
        Ok(hits)
    }

    /// Full document for a search hit id.
    #[instrument(skip(self))]
    pub async fn fetch(&self, id: &str) -> Result<Document, ServiceError> {
        let reference: DocumentRef = id.parse()?;
        match reference {
            DocumentRef::Item(item_id) => {
                let item = self.inventory.get_item(item_id).await?;
                let text = format!(
                    "{}: {} {} of {} stored in {}. Expires: {}. Opened: {}. Supplier: {}. Lot: {}.",
                    item.name,
                    item.quantity.normalize(),
                    item.unit,
                    item.category,
                    item.location,
                    item.expiration_date.map(|d| d.to_string()).unwrap_or_else(|| "n/a".into()),
                    item.opened_date.map(|d| d.to_string()).unwrap_or_else(|| "n/a".into()),
                    item.supplier.as_deref().unwrap_or("n/a"),
                    item.lot_code.as_deref().unwrap_or("n/a"),
                );
                Ok(Document {
                    id: reference.to_string(),
                    title: item.name.clone(),
                    text,
                    metadata: serde_json::to_value(&item)
                        .map_err(|e| ServiceError::InternalError(e.to_string()))?,
                })
            }
            DocumentRef::Task(task_id) => {
                let task = self.tasks.get(task_id).await?;
                let text = format!(
                    "{} [{}] priority {}. Due: {}. Assignee: {}. Recurrence: {}. {}",
                    task.title,
                    task.status,
                    task.priority,
                    task.due_date.map(|d| d.to_string()).unwrap_or_else(|| "n/a".into()),
                    task.assignee.as_deref().unwrap_or("unassigned"),
                    task.recurrence.map(|r| r.to_string()).unwrap_or_else(|| "none".into()),
                    task.description.as_deref().unwrap_or(""),
                );
                Ok(Document {
                    id: reference.to_string(),
                    title: task.title.clone(),
                    text: text.trim_end().to_string(),
                    metadata: serde_json::to_value(&task)
                        .map_err(|e| ServiceError::InternalError(e.to_string()))?,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_refs_parse_and_render() {
        assert_eq!("item-12".parse::<DocumentRef>().unwrap(), DocumentRef::Item(12));
        assert_eq!("task-3".parse::<DocumentRef>().unwrap(), DocumentRef::Task(3));
        assert_eq!(DocumentRef::Task(3).to_string(), "task-3");
    }

    #[test]
    fn malformed_refs_are_rejected() {
        for raw in ["item", "item-", "item-x", "order-4", ""] {
            assert!(raw.parse::<DocumentRef>().is_err(), "{raw} should not parse");
        }
    }
}
