use async_trait::async_trait;
use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    #[sea_orm(string_value = "HIGH")]
    High,
    #[default]
    #[sea_orm(string_value = "MEDIUM")]
    Medium,
    #[sea_orm(string_value = "LOW")]
    Low,
}

/// Lifecycle state of a task.
///
/// `Done` and `Cancelled` are terminal: no transition leaves them.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    #[sea_orm(string_value = "TODO")]
    Todo,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "DONE")]
    Done,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Todo, InProgress) | (Todo, Done) | (Todo, Cancelled) | (InProgress, Done) | (InProgress, Cancelled)
        )
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrenceFrequency {
    #[sea_orm(string_value = "DAILY")]
    Daily,
    #[sea_orm(string_value = "WEEKLY")]
    Weekly,
    #[sea_orm(string_value = "MONTHLY")]
    Monthly,
}

impl RecurrenceFrequency {
    /// Adds one interval to `from`.
    ///
    /// Monthly steps clamp to the last day of the target month, so Jan 31
    /// becomes Feb 29 in a leap year and Feb 28 otherwise. Returns `None`
    /// only when the result leaves chrono's representable range.
    pub fn advance(self, from: NaiveDate) -> Option<NaiveDate> {
        match self {
            RecurrenceFrequency::Daily => from.checked_add_days(Days::new(1)),
            RecurrenceFrequency::Weekly => from.checked_add_days(Days::new(7)),
            RecurrenceFrequency::Monthly => from.checked_add_months(Months::new(1)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Task)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub assignee: Option<String>,
    pub is_recurring: bool,
    pub recurrence: Option<RecurrenceFrequency>,
    pub parent_task_id: Option<i32>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentTaskId",
        to = "Column::Id",
        on_delete = "SetNull"
    )]
    Parent,
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert && !matches!(active_model.created_at, Set(_)) {
            active_model.created_at = Set(now);
        }
        if !matches!(active_model.updated_at, Set(_)) {
            active_model.updated_at = Set(now);
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(TaskStatus::Todo, TaskStatus::InProgress, true)]
    #[case(TaskStatus::Todo, TaskStatus::Done, true)]
    #[case(TaskStatus::Todo, TaskStatus::Cancelled, true)]
    #[case(TaskStatus::InProgress, TaskStatus::Done, true)]
    #[case(TaskStatus::InProgress, TaskStatus::Cancelled, true)]
    #[case(TaskStatus::InProgress, TaskStatus::Todo, false)]
    #[case(TaskStatus::Todo, TaskStatus::Todo, false)]
    #[case(TaskStatus::Done, TaskStatus::Todo, false)]
    #[case(TaskStatus::Done, TaskStatus::InProgress, false)]
    #[case(TaskStatus::Done, TaskStatus::Cancelled, false)]
    #[case(TaskStatus::Cancelled, TaskStatus::Todo, false)]
    #[case(TaskStatus::Cancelled, TaskStatus::Done, false)]
    fn transition_table(#[case] from: TaskStatus, #[case] to: TaskStatus, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn terminal_states() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Todo.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }

    #[rstest]
    #[case(RecurrenceFrequency::Daily, date(2024, 1, 10), date(2024, 1, 11))]
    #[case(RecurrenceFrequency::Weekly, date(2024, 1, 10), date(2024, 1, 17))]
    #[case(RecurrenceFrequency::Weekly, date(2023, 12, 28), date(2024, 1, 4))]
    #[case(RecurrenceFrequency::Monthly, date(2024, 1, 15), date(2024, 2, 15))]
    #[case(RecurrenceFrequency::Monthly, date(2024, 1, 31), date(2024, 2, 29))]
    #[case(RecurrenceFrequency::Monthly, date(2023, 1, 31), date(2023, 2, 28))]
    #[case(RecurrenceFrequency::Monthly, date(2024, 12, 31), date(2025, 1, 31))]
    fn advance_by_frequency(
        #[case] frequency: RecurrenceFrequency,
        #[case] from: NaiveDate,
        #[case] expected: NaiveDate,
    ) {
        assert_eq!(frequency.advance(from), Some(expected));
    }

    #[test]
    fn status_labels_match_storage_values() {
        assert_eq!(TaskStatus::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            serde_json::json!("IN_PROGRESS")
        );
    }
}
