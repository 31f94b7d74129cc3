use super::AppState;
use crate::{
    services::statistics::{ConsumptionStats, ConsumptionStatsQuery, TaskStats, TaskStatsQuery},
    ApiResponse, ApiResult,
};
use axum::extract::{Json, Query, State};

/// Consumption totals per group with a daily average
#[utoipa::path(
    get,
    path = "/api/v1/stats/consumption",
    params(ConsumptionStatsQuery),
    responses(
        (status = 200, description = "Consumption statistics", body = ConsumptionStats),
        (status = 400, description = "Invalid window", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "statistics"
)]
pub async fn consumption_stats(
    State(state): State<AppState>,
    Query(query): Query<ConsumptionStatsQuery>,
) -> ApiResult<ConsumptionStats> {
    let statistics = &state.services.statistics;
    let window = statistics.resolve_window(query.start, query.end)?;
    let stats = statistics
        .consumption_stats(window, query.group_by.unwrap_or_default())
        .await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// Task counts per group over tasks updated inside the window
#[utoipa::path(
    get,
    path = "/api/v1/stats/tasks",
    params(TaskStatsQuery),
    responses(
        (status = 200, description = "Task statistics", body = TaskStats),
        (status = 400, description = "Invalid window", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "statistics"
)]
pub async fn task_stats(
    State(state): State<AppState>,
    Query(query): Query<TaskStatsQuery>,
) -> ApiResult<TaskStats> {
    let statistics = &state.services.statistics;
    let window = statistics.resolve_window(query.start, query.end)?;
    let stats = statistics
        .task_stats(window, query.group_by.unwrap_or_default())
        .await?;
    Ok(Json(ApiResponse::success(stats)))
}
