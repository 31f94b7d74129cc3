use crate::{
    db::{self, DbPool},
    entities::{
        operation_log::OperationKind,
        task::{self, Entity as Task, RecurrenceFrequency, TaskPriority, TaskStatus},
    },
    errors::ServiceError,
    services::audit::{self, TASKS_TABLE},
};
use chrono::{Days, NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    prelude::Expr, sea_query::NullOrdering, ActiveModelTrait, ColumnTrait, DatabaseTransaction,
    EntityTrait, IntoActiveModel, Order, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

const DEFAULT_LIST_LIMIT: u64 = 100;
const MAX_LIST_LIMIT: u64 = 500;

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct NewTask {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 100))]
    pub assignee: Option<String>,
    /// Inferred from `recurrence` when omitted.
    pub recurring: Option<bool>,
    pub recurrence: Option<RecurrenceFrequency>,
}

/// Partial edit of a task's descriptive fields. Status only moves through
/// the lifecycle operations.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct TaskUpdate {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 100))]
    pub assignee: Option<String>,
    pub recurring: Option<bool>,
    pub recurrence: Option<RecurrenceFrequency>,
}

impl TaskUpdate {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.assignee.is_none()
            && self.recurring.is_none()
            && self.recurrence.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee: Option<String>,
    /// Due on or before today + N days, overdue tasks included
    pub due_within_days: Option<i64>,
    #[serde(default)]
    pub recurring_only: bool,
    /// Defaults to 100, capped at 500
    pub limit: Option<u64>,
}

/// Outcome of a status change. `next_occurrence` is set when completing a
/// recurring task materialized its successor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskTransition {
    pub task: task::Model,
    pub previous_status: TaskStatus,
    pub next_occurrence: Option<task::Model>,
}

/// Reconciles the recurrence flag with the frequency; both must agree.
fn resolve_recurrence(
    recurring: Option<bool>,
    recurrence: Option<RecurrenceFrequency>,
) -> Result<(bool, Option<RecurrenceFrequency>), ServiceError> {
    match (recurring, recurrence) {
        (None, freq) => Ok((freq.is_some(), freq)),
        (Some(true), Some(freq)) => Ok((true, Some(freq))),
        (Some(false), None) => Ok((false, None)),
        (Some(true), None) => Err(ServiceError::ValidationError(
            "recurring tasks need a recurrence frequency".into(),
        )),
        (Some(false), Some(_)) => Err(ServiceError::ValidationError(
            "recurrence is only allowed on recurring tasks".into(),
        )),
    }
}

fn validate_title(title: &str) -> Result<(), ServiceError> {
    if title.trim().is_empty() {
        return Err(ServiceError::ValidationError("title must not be blank".into()));
    }
    Ok(())
}

/// Due date of the occurrence following `task`.
pub fn next_due_date(
    frequency: RecurrenceFrequency,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<NaiveDate, ServiceError> {
    let base = due_date.unwrap_or(today);
    frequency
        .advance(base)
        .ok_or_else(|| ServiceError::ValidationError(format!("cannot advance {} by one interval", base)))
}

async fn lock_task(txn: &DatabaseTransaction, task_id: i32) -> Result<task::Model, ServiceError> {
    Task::find_by_id(task_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Task {} not found", task_id)))
}

/// Moves a task along the lifecycle graph inside `txn`. Reaching `Done`
/// spawns the next occurrence of a recurring task.
async fn apply_transition(
    txn: &DatabaseTransaction,
    task_id: i32,
    to: TaskStatus,
    actor: &str,
    reason: Option<String>,
    today: NaiveDate,
) -> Result<TaskTransition, ServiceError> {
    let current = lock_task(txn, task_id).await?;
    let from = current.status;
    if !from.can_transition_to(to) {
        return Err(ServiceError::InvalidTransition { task_id, from, to });
    }

    let mut active = current.clone().into_active_model();
    active.status = Set(to);
    active.updated_by = Set(actor.to_string());
    active.updated_at = Set(Utc::now());
    let task = active.update(txn).await?;

    let next_occurrence = match (to, current.recurrence) {
        (TaskStatus::Done, Some(frequency)) if current.is_recurring => {
            let due = next_due_date(frequency, current.due_date, today)?;
            let successor = task::ActiveModel {
                title: Set(current.title.clone()),
                description: Set(current.description.clone()),
                priority: Set(current.priority),
                status: Set(TaskStatus::Todo),
                due_date: Set(Some(due)),
                assignee: Set(current.assignee.clone()),
                is_recurring: Set(true),
                recurrence: Set(Some(frequency)),
                parent_task_id: Set(Some(task_id)),
                created_by: Set(actor.to_string()),
                updated_by: Set(actor.to_string()),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            audit::record(
                txn,
                OperationKind::Insert,
                TASKS_TABLE,
                successor.id,
                actor,
                json!({ "parent_task_id": task_id, "due_date": due, "recurrence": frequency }),
            )
            .await?;
            Some(successor)
        }
        _ => None,
    };

    let kind = match to {
        TaskStatus::Done => OperationKind::Complete,
        TaskStatus::Cancelled => OperationKind::Cancel,
        _ => OperationKind::StatusChange,
    };
    audit::record(
        txn,
        kind,
        TASKS_TABLE,
        task_id,
        actor,
        json!({
            "from": from,
            "to": to,
            "reason": reason,
            "next_task_id": next_occurrence.as_ref().map(|t| t.id),
        }),
    )
    .await?;

    Ok(TaskTransition {
        task,
        previous_status: from,
        next_occurrence,
    })
}

#[derive(Clone)]
pub struct TaskService {
    db_pool: Arc<DbPool>,
    timeout: Duration,
}

impl TaskService {
    pub fn new(db_pool: Arc<DbPool>, timeout: Duration) -> Self {
        Self { db_pool, timeout }
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create(&self, input: NewTask, actor: &str) -> Result<task::Model, ServiceError> {
        input.validate()?;
        validate_title(&input.title)?;
        let (is_recurring, recurrence) = resolve_recurrence(input.recurring, input.recurrence)?;

        let actor = actor.to_string();
        let task = db::transactional(self.db_pool.as_ref(), self.timeout, "create_task", move |txn| {
            Box::pin(async move {
                let model = task::ActiveModel {
                    title: Set(input.title.trim().to_string()),
                    description: Set(input.description),
                    priority: Set(input.priority.unwrap_or_default()),
                    status: Set(TaskStatus::Todo),
                    due_date: Set(input.due_date),
                    assignee: Set(input.assignee),
                    is_recurring: Set(is_recurring),
                    recurrence: Set(recurrence),
                    parent_task_id: Set(None),
                    created_by: Set(actor.clone()),
                    updated_by: Set(actor.clone()),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                audit::record(
                    txn,
                    OperationKind::Insert,
                    TASKS_TABLE,
                    model.id,
                    &actor,
                    json!({
                        "title": model.title,
                        "priority": model.priority,
                        "due_date": model.due_date,
                        "recurrence": model.recurrence,
                    }),
                )
                .await?;
                Ok(model)
            })
        })
        .await?;

        counter!("pantry_ledger.tasks.created", 1);
        info!(task_id = task.id, "task created");
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, task_id: i32) -> Result<task::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        db::with_timeout(self.timeout, "get_task", async move {
            Task::find_by_id(task_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Task {} not found", task_id)))
        })
        .await
    }

    #[instrument(skip(self, changes))]
    pub async fn update(
        &self,
        task_id: i32,
        changes: TaskUpdate,
        actor: &str,
    ) -> Result<task::Model, ServiceError> {
        if changes.is_empty() {
            return Err(ServiceError::ValidationError(
                "at least one field must be provided".into(),
            ));
        }
        changes.validate()?;
        if let Some(title) = &changes.title {
            validate_title(title)?;
        }

        let actor = actor.to_string();
        let task = db::transactional(self.db_pool.as_ref(), self.timeout, "update_task", move |txn| {
            Box::pin(async move {
                let current = lock_task(txn, task_id).await?;

                // A frequency alone implies the flag; clearing the flag clears the frequency.
                let (is_recurring, recurrence) = match (changes.recurring, changes.recurrence) {
                    (None, None) => (current.is_recurring, current.recurrence),
                    (None, Some(freq)) => (true, Some(freq)),
                    (Some(true), None) => resolve_recurrence(Some(true), current.recurrence)?,
                    (Some(false), None) => (false, None),
                    (flag, freq) => resolve_recurrence(flag, freq)?,
                };

                let mut diff = Map::new();
                let mut active = current.clone().into_active_model();

                if let Some(title) = changes.title {
                    let title = title.trim().to_string();
                    if title != current.title {
                        diff.insert("title".into(), json!({ "from": current.title, "to": title }));
                        active.title = Set(title);
                    }
                }
                if let Some(description) = changes.description {
                    if current.description.as_deref() != Some(description.as_str()) {
                        diff.insert(
                            "description".into(),
                            json!({ "from": current.description, "to": description }),
                        );
                        active.description = Set(Some(description));
                    }
                }
                if let Some(priority) = changes.priority {
                    if priority != current.priority {
                        diff.insert("priority".into(), json!({ "from": current.priority, "to": priority }));
                        active.priority = Set(priority);
                    }
                }
                if let Some(due) = changes.due_date {
                    if current.due_date != Some(due) {
                        diff.insert("due_date".into(), json!({ "from": current.due_date, "to": due }));
                        active.due_date = Set(Some(due));
                    }
                }
                if let Some(assignee) = changes.assignee {
                    if current.assignee.as_deref() != Some(assignee.as_str()) {
                        diff.insert(
                            "assignee".into(),
                            json!({ "from": current.assignee, "to": assignee }),
                        );
                        active.assignee = Set(Some(assignee));
                    }
                }
                if is_recurring != current.is_recurring || recurrence != current.recurrence {
                    diff.insert(
                        "recurrence".into(),
                        json!({ "from": current.recurrence, "to": recurrence }),
                    );
                    active.is_recurring = Set(is_recurring);
                    active.recurrence = Set(recurrence);
                }

                if diff.is_empty() {
                    return Ok(current);
                }

                active.updated_by = Set(actor.clone());
                active.updated_at = Set(Utc::now());
                let updated = active.update(txn).await?;
                audit::record(
                    txn,
                    OperationKind::Update,
                    TASKS_TABLE,
                    task_id,
                    &actor,
                    Value::Object(diff),
                )
                .await?;
                Ok(updated)
            })
        })
        .await?;

        info!(task_id, "task updated");
        Ok(task)
    }

    pub async fn list(&self, filter: TaskFilter) -> Result<Vec<task::Model>, ServiceError> {
        self.list_as_of(filter, Utc::now().date_naive()).await
    }

    /// Conjunctive filtering, earliest due date first with undated tasks last.
    #[instrument(skip(self))]
    pub async fn list_as_of(
        &self,
        filter: TaskFilter,
        today: NaiveDate,
    ) -> Result<Vec<task::Model>, ServiceError> {
        let horizon = match filter.due_within_days {
            Some(days) if !(0..=3650).contains(&days) => {
                return Err(ServiceError::ValidationError(format!(
                    "due_within_days must be between 0 and 3650, got {}",
                    days
                )))
            }
            Some(days) => Some(
                today
                    .checked_add_days(Days::new(days as u64))
                    .ok_or_else(|| ServiceError::ValidationError("date out of range".into()))?,
            ),
            None => None,
        };

        let db = self.db_pool.as_ref();
        db::with_timeout(self.timeout, "list_tasks", async move {
            let mut query = Task::find();
            if let Some(status) = filter.status {
                query = query.filter(task::Column::Status.eq(status));
            }
            if let Some(priority) = filter.priority {
                query = query.filter(task::Column::Priority.eq(priority));
            }
            if let Some(assignee) = filter.assignee {
                query = query.filter(task::Column::Assignee.eq(assignee));
            }
            if let Some(horizon) = horizon {
                query = query
                    .filter(task::Column::DueDate.is_not_null())
                    .filter(task::Column::DueDate.lte(horizon));
            }
            if filter.recurring_only {
                query = query.filter(task::Column::IsRecurring.eq(true));
            }

            Ok(query
                .order_by_with_nulls(task::Column::DueDate, Order::Asc, NullOrdering::Last)
                .order_by_asc(task::Column::Id)
                .limit(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT))
                .all(db)
                .await?)
        })
        .await
    }

    /// Moves a task to `new_status`. `Done` takes the completion path, so a
    /// recurring task spawns its next occurrence here too.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        task_id: i32,
        new_status: TaskStatus,
        actor: &str,
    ) -> Result<TaskTransition, ServiceError> {
        self.transition(task_id, new_status, actor, None, Utc::now().date_naive())
            .await
    }

    pub async fn complete(&self, task_id: i32, actor: &str) -> Result<TaskTransition, ServiceError> {
        self.complete_as_of(task_id, actor, Utc::now().date_naive())
            .await
    }

    /// Marks the task done. For a recurring task the successor is due one
    /// interval after the prior due date, or after `today` when it had none.
    #[instrument(skip(self))]
    pub async fn complete_as_of(
        &self,
        task_id: i32,
        actor: &str,
        today: NaiveDate,
    ) -> Result<TaskTransition, ServiceError> {
        self.transition(task_id, TaskStatus::Done, actor, None, today)
            .await
    }

    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        task_id: i32,
        reason: Option<String>,
        actor: &str,
    ) -> Result<TaskTransition, ServiceError> {
        if let Some(reason) = &reason {
            if reason.chars().count() > 500 {
                return Err(ServiceError::ValidationError(
                    "reason must be at most 500 characters".into(),
                ));
            }
        }
        self.transition(task_id, TaskStatus::Cancelled, actor, reason, Utc::now().date_naive())
            .await
    }

    async fn transition(
        &self,
        task_id: i32,
        to: TaskStatus,
        actor: &str,
        reason: Option<String>,
        today: NaiveDate,
    ) -> Result<TaskTransition, ServiceError> {
        let actor = actor.to_string();
        let result = db::transactional(self.db_pool.as_ref(), self.timeout, "task_transition", move |txn| {
            Box::pin(async move { apply_transition(txn, task_id, to, &actor, reason, today).await })
        })
        .await;

        match &result {
            Ok(outcome) => {
                counter!("pantry_ledger.tasks.transitions", 1, "to" => to.to_string());
                info!(
                    task_id,
                    from = %outcome.previous_status,
                    to = %to,
                    next_task_id = ?outcome.next_occurrence.as_ref().map(|t| t.id),
                    "task status changed"
                );
            }
            Err(e) => warn!(task_id, to = %to, error = %e, "task transition rejected"),
        }
        result
    }

    /// Case-insensitive substring match over title and description.
    pub async fn search(&self, term: &str, limit: u64) -> Result<Vec<task::Model>, ServiceError> {
        let pattern = format!("%{}%", term.trim().to_lowercase());
        let db = self.db_pool.as_ref();
        db::with_timeout(self.timeout, "search_tasks", async move {
            let lower = |col: task::Column| Expr::expr(sea_orm::sea_query::Func::lower(Expr::col(col)));
            Ok(Task::find()
                .filter(
                    lower(task::Column::Title)
                        .like(pattern.as_str())
                        .or(lower(task::Column::Description).like(pattern.as_str())),
                )
                .order_by_asc(task::Column::Id)
                .limit(limit)
                .all(db)
                .await?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn recurrence_flag_is_inferred() {
        assert_eq!(
            resolve_recurrence(None, Some(RecurrenceFrequency::Weekly)).unwrap(),
            (true, Some(RecurrenceFrequency::Weekly))
        );
        assert_eq!(resolve_recurrence(None, None).unwrap(), (false, None));
    }

    #[test]
    fn mismatched_recurrence_is_rejected() {
        assert_matches!(
            resolve_recurrence(Some(true), None),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            resolve_recurrence(Some(false), Some(RecurrenceFrequency::Daily)),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn next_due_uses_today_when_undated() {
        let today = date(2024, 3, 5);
        assert_eq!(
            next_due_date(RecurrenceFrequency::Daily, None, today).unwrap(),
            date(2024, 3, 6)
        );
        assert_eq!(
            next_due_date(RecurrenceFrequency::Weekly, Some(date(2024, 1, 10)), today).unwrap(),
            date(2024, 1, 17)
        );
    }

    #[test]
    fn blank_title_is_rejected() {
        assert!(validate_title("   ").is_err());
        assert!(validate_title("Defrost freezer").is_ok());
    }
}
