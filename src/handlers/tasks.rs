use super::AppState;
use crate::{
    entities::{task, TaskStatus},
    errors::ServiceError,
    middleware_helpers::Actor,
    services::tasks::{NewTask, TaskFilter, TaskTransition, TaskUpdate},
    ApiResponse, ApiResult,
};
use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusChangeRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// Create a task
#[utoipa::path(
    post,
    path = "/api/v1/tasks",
    request_body = NewTask,
    responses(
        (status = 201, description = "Task created", body = task::Model),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn create_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<NewTask>,
) -> Result<impl IntoResponse, ServiceError> {
    let task = state.services.tasks.create(payload, actor.as_str()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(task))))
}

/// List tasks, earliest due first
#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    params(TaskFilter),
    responses(
        (status = 200, description = "Tasks", body = Vec<task::Model>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Vec<task::Model>> {
    let tasks = state.services.tasks.list(filter).await?;
    Ok(Json(ApiResponse::success(tasks)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    params(("id" = i32, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task returned", body = task::Model),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn get_task(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<task::Model> {
    let task = state.services.tasks.get(id).await?;
    Ok(Json(ApiResponse::success(task)))
}

/// Edit a task's descriptive fields
#[utoipa::path(
    patch,
    path = "/api/v1/tasks/{id}",
    params(("id" = i32, Path, description = "Task id")),
    request_body = TaskUpdate,
    responses(
        (status = 200, description = "Task updated", body = task::Model),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn update_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    Json(payload): Json<TaskUpdate>,
) -> ApiResult<task::Model> {
    let task = state.services.tasks.update(id, payload, actor.as_str()).await?;
    Ok(Json(ApiResponse::success(task)))
}

/// Move a task to another lifecycle state
#[utoipa::path(
    put,
    path = "/api/v1/tasks/{id}/status",
    params(("id" = i32, Path, description = "Task id")),
    request_body = StatusChangeRequest,
    responses(
        (status = 200, description = "Status changed", body = TaskTransition),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn update_task_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    Json(payload): Json<StatusChangeRequest>,
) -> ApiResult<TaskTransition> {
    let outcome = state
        .services
        .tasks
        .update_status(id, payload.status, actor.as_str())
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Complete a task, scheduling the next occurrence of a recurring one
#[utoipa::path(
    post,
    path = "/api/v1/tasks/{id}/complete",
    params(("id" = i32, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task completed", body = TaskTransition),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Task already closed", body = crate::errors::ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn complete_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
) -> ApiResult<TaskTransition> {
    let outcome = state.services.tasks.complete(id, actor.as_str()).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[utoipa::path(
    post,
    path = "/api/v1/tasks/{id}/cancel",
    params(("id" = i32, Path, description = "Task id")),
    request_body(content = CancelRequest, description = "Optional cancellation reason"),
    responses(
        (status = 200, description = "Task cancelled", body = TaskTransition),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Task already closed", body = crate::errors::ErrorResponse)
    ),
    tag = "tasks"
)]
pub async fn cancel_task(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    payload: Option<Json<CancelRequest>>,
) -> ApiResult<TaskTransition> {
    let reason = payload.and_then(|Json(body)| body.reason);
    let outcome = state
        .services
        .tasks
        .cancel(id, reason, actor.as_str())
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
