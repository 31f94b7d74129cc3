use super::AppState;
use crate::{
    entities::operation_log,
    services::audit::OperationLogFilter,
    ApiResponse, ApiResult,
};
use axum::extract::{Json, Query, State};

/// Audit trail of mutations, newest first
#[utoipa::path(
    get,
    path = "/api/v1/operations",
    params(OperationLogFilter),
    responses(
        (status = 200, description = "Operation log entries", body = Vec<operation_log::Model>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "operations"
)]
pub async fn list_operations(
    State(state): State<AppState>,
    Query(filter): Query<OperationLogFilter>,
) -> ApiResult<Vec<operation_log::Model>> {
    let entries = state.services.audit.list(filter).await?;
    Ok(Json(ApiResponse::success(entries)))
}
