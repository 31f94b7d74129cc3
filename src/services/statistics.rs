use crate::{
    db::{self, DbPool},
    entities::{
        consumption_event::{self, Entity as ConsumptionEvent},
        inventory_item,
        task::{self, Entity as Task},
    },
    errors::ServiceError,
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    prelude::Expr, ColumnTrait, EntityTrait, FromQueryResult, JoinType, QueryFilter, QuerySelect,
    RelationTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};

const TOTAL_LABEL: &str = "TOTAL";
const UNASSIGNED_LABEL: &str = "UNASSIGNED";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConsumptionGroupBy {
    #[default]
    Category,
    Reason,
    Total,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskGroupBy {
    #[default]
    Status,
    Priority,
    Assignee,
}

/// Inclusive range of calendar days, interpreted in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatsWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StatsWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ServiceError> {
        if end < start {
            return Err(ServiceError::ValidationError(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// `end` and the `lookback_days` calendar days before it.
    pub fn ending_on(end: NaiveDate, lookback_days: u32) -> Result<Self, ServiceError> {
        let start = end
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .ok_or_else(|| ServiceError::ValidationError("window leaves the calendar".into()))?;
        Self::new(start, end)
    }

    /// Fills missing bounds. A missing `end` is `today` (or `start` when that
    /// lies in the future), a missing `start` is `default_days` before `end`.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        default_days: u32,
        today: NaiveDate,
    ) -> Result<Self, ServiceError> {
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end),
            (Some(start), None) => Self::new(start, today.max(start)),
            (None, Some(end)) => Self::ending_on(end, default_days),
            (None, None) => Self::ending_on(today, default_days),
        }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Half-open `[start 00:00, end + 1 day 00:00)` in UTC.
    fn bounds(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
        let upper = self
            .end
            .checked_add_days(Days::new(1))
            .ok_or_else(|| ServiceError::ValidationError("window leaves the calendar".into()))?;
        Ok((
            self.start.and_time(chrono::NaiveTime::MIN).and_utc(),
            upper.and_time(chrono::NaiveTime::MIN).and_utc(),
        ))
    }
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
pub struct ConsumptionStatsQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub group_by: Option<ConsumptionGroupBy>,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
pub struct TaskStatsQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub group_by: Option<TaskGroupBy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConsumptionStatRow {
    pub group_label: String,
    pub total_quantity: Decimal,
    pub event_count: i64,
    pub daily_average: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConsumptionStats {
    pub window: StatsWindow,
    pub days: i64,
    pub group_by: ConsumptionGroupBy,
    pub rows: Vec<ConsumptionStatRow>,
    /// Sum of `total_quantity` over all rows.
    pub total_quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskStatRow {
    pub group_label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskStats {
    pub window: StatsWindow,
    pub group_by: TaskGroupBy,
    pub rows: Vec<TaskStatRow>,
    pub total_tasks: i64,
}

#[derive(Debug, FromQueryResult)]
struct ConsumptionGroup {
    group_label: String,
    total_quantity: Option<Decimal>,
    event_count: i64,
}

#[derive(Debug, FromQueryResult)]
struct TaskGroup {
    group_label: Option<String>,
    task_count: i64,
}

fn summarize_consumption(groups: Vec<ConsumptionGroup>, days: i64) -> Vec<ConsumptionStatRow> {
    let divisor = Decimal::from(days.max(1));
    let mut rows: Vec<ConsumptionStatRow> = groups
        .into_iter()
        .filter(|g| g.event_count > 0)
        .map(|g| {
            let total = g.total_quantity.unwrap_or_default().round_dp(3);
            ConsumptionStatRow {
                group_label: g.group_label,
                total_quantity: total.normalize(),
                event_count: g.event_count,
                daily_average: (total / divisor).round_dp(3).normalize(),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_quantity
            .cmp(&a.total_quantity)
            .then_with(|| a.group_label.cmp(&b.group_label))
    });
    rows
}

fn summarize_tasks(groups: Vec<TaskGroup>) -> Vec<TaskStatRow> {
    let mut rows: Vec<TaskStatRow> = groups
        .into_iter()
        .filter(|g| g.task_count > 0)
        .map(|g| TaskStatRow {
            group_label: g.group_label.unwrap_or_else(|| UNASSIGNED_LABEL.to_string()),
            count: g.task_count,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.group_label.cmp(&b.group_label)));
    rows
}

#[derive(Clone)]
pub struct StatisticsService {
    db_pool: Arc<DbPool>,
    timeout: Duration,
    default_window_days: u32,
}

impl StatisticsService {
    pub fn new(db_pool: Arc<DbPool>, timeout: Duration, default_window_days: u32) -> Self {
        Self {
            db_pool,
            timeout,
            default_window_days,
        }
    }

    pub fn resolve_window(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<StatsWindow, ServiceError> {
        StatsWindow::resolve(start, end, self.default_window_days, Utc::now().date_naive())
    }

    /// Consumption totals per group with `daily_average = total / days`,
    /// largest total first. Groups without events are omitted.
    #[instrument(skip(self))]
    pub async fn consumption_stats(
        &self,
        window: StatsWindow,
        group_by: ConsumptionGroupBy,
    ) -> Result<ConsumptionStats, ServiceError> {
        let (lower, upper) = window.bounds()?;
        let db = self.db_pool.as_ref();

        let groups = db::with_timeout(self.timeout, "consumption_stats", async move {
            let base = ConsumptionEvent::find()
                .select_only()
                .column_as(consumption_event::Column::Quantity.sum(), "total_quantity")
                .column_as(consumption_event::Column::Id.count(), "event_count")
                .filter(consumption_event::Column::ConsumedAt.gte(lower))
                .filter(consumption_event::Column::ConsumedAt.lt(upper));

            let query = match group_by {
                ConsumptionGroupBy::Category => base
                    .join(JoinType::InnerJoin, consumption_event::Relation::InventoryItem.def())
                    .column_as(inventory_item::Column::Category, "group_label")
                    .group_by(inventory_item::Column::Category),
                ConsumptionGroupBy::Reason => base
                    .column_as(consumption_event::Column::Reason, "group_label")
                    .group_by(consumption_event::Column::Reason),
                ConsumptionGroupBy::Total => base.column_as(Expr::value(TOTAL_LABEL), "group_label"),
            };

            Ok(query.into_model::<ConsumptionGroup>().all(db).await?)
        })
        .await?;

        debug!(groups = groups.len(), "consumption groups loaded");
        let days = window.days();
        let rows = summarize_consumption(groups, days);
        let total_quantity = rows
            .iter()
            .map(|r| r.total_quantity)
            .sum::<Decimal>()
            .normalize();
        Ok(ConsumptionStats {
            window,
            days,
            group_by,
            rows,
            total_quantity,
        })
    }

    /// Task counts per group over tasks last updated inside the window.
    #[instrument(skip(self))]
    pub async fn task_stats(
        &self,
        window: StatsWindow,
        group_by: TaskGroupBy,
    ) -> Result<TaskStats, ServiceError> {
        let (lower, upper) = window.bounds()?;
        let db = self.db_pool.as_ref();

        let groups = db::with_timeout(self.timeout, "task_stats", async move {
            let column = match group_by {
                TaskGroupBy::Status => task::Column::Status,
                TaskGroupBy::Priority => task::Column::Priority,
                TaskGroupBy::Assignee => task::Column::Assignee,
            };
            Ok(Task::find()
                .select_only()
                .column_as(column, "group_label")
                .column_as(task::Column::Id.count(), "task_count")
                .filter(task::Column::UpdatedAt.gte(lower))
                .filter(task::Column::UpdatedAt.lt(upper))
                .group_by(column)
                .into_model::<TaskGroup>()
                .all(db)
                .await?)
        })
        .await?;

        let rows = summarize_tasks(groups);
        let total_tasks = rows.iter().map(|r| r.count).sum();
        Ok(TaskStats {
            window,
            group_by,
            rows,
            total_tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_rejects_reversed_bounds() {
        assert_matches!(
            StatsWindow::new(date(2024, 2, 2), date(2024, 2, 1)),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn single_day_window_spans_one_day() {
        let window = StatsWindow::new(date(2024, 2, 1), date(2024, 2, 1)).unwrap();
        assert_eq!(window.days(), 1);
        let (lower, upper) = window.bounds().unwrap();
        assert_eq!((upper - lower).num_hours(), 24);
    }

    #[test]
    fn window_ending_on_counts_both_endpoints() {
        let window = StatsWindow::ending_on(date(2024, 3, 31), 30).unwrap();
        assert_eq!(window.start, date(2024, 3, 1));
        assert_eq!(window.days(), 31);
        assert_eq!(StatsWindow::ending_on(date(2024, 3, 31), 0).unwrap().days(), 1);
    }

    #[test]
    fn resolve_without_bounds_looks_back_from_today() {
        let window = StatsWindow::resolve(None, None, 30, date(2024, 3, 31)).unwrap();
        assert_eq!(window.start, date(2024, 3, 1));
        assert_eq!(window.end, date(2024, 3, 31));
        assert_eq!(window.days(), 31);
    }

    #[test]
    fn resolve_with_only_end_looks_back_from_end() {
        let window = StatsWindow::resolve(None, Some(date(2024, 3, 31)), 30, date(2024, 6, 1)).unwrap();
        assert_eq!(window.start, date(2024, 3, 1));
        assert_eq!(window.end, date(2024, 3, 31));
        assert_eq!(window.days(), 31);
    }

    #[test]
    fn resolve_with_only_start_runs_through_today() {
        let window = StatsWindow::resolve(Some(date(2024, 5, 20)), None, 30, date(2024, 6, 1)).unwrap();
        assert_eq!(window.end, date(2024, 6, 1));
        assert_eq!(window.days(), 13);

        let future = StatsWindow::resolve(Some(date(2024, 7, 1)), None, 30, date(2024, 6, 1)).unwrap();
        assert_eq!(future.days(), 1);
    }

    #[test]
    fn resolve_keeps_explicit_bounds() {
        let window =
            StatsWindow::resolve(Some(date(2024, 1, 1)), Some(date(2024, 1, 10)), 30, date(2024, 6, 1))
                .unwrap();
        assert_eq!(window.days(), 10);
        assert_matches!(
            StatsWindow::resolve(Some(date(2024, 1, 10)), Some(date(2024, 1, 1)), 30, date(2024, 6, 1)),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn consumption_rows_are_averaged_and_sorted() {
        let rows = summarize_consumption(
            vec![
                ConsumptionGroup {
                    group_label: "DAIRY".into(),
                    total_quantity: Some(dec!(3)),
                    event_count: 2,
                },
                ConsumptionGroup {
                    group_label: "FRUIT".into(),
                    total_quantity: Some(dec!(10)),
                    event_count: 4,
                },
                ConsumptionGroup {
                    group_label: "MEAT".into(),
                    total_quantity: None,
                    event_count: 0,
                },
            ],
            4,
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].group_label, "FRUIT");
        assert_eq!(rows[0].daily_average, dec!(2.5));
        assert_eq!(rows[1].daily_average, dec!(0.75));
    }

    #[test]
    fn missing_assignee_is_labelled() {
        let rows = summarize_tasks(vec![
            TaskGroup {
                group_label: None,
                task_count: 3,
            },
            TaskGroup {
                group_label: Some("sam".into()),
                task_count: 1,
            },
        ]);
        assert_eq!(rows[0].group_label, UNASSIGNED_LABEL);
        assert_eq!(rows[1].count, 1);
    }
}
