use super::AppState;
use crate::{
    entities::{consumption_event, inventory_item, Category, ConsumptionReason, StorageLocation},
    errors::ServiceError,
    middleware_helpers::Actor,
    services::{
        consumption::{ConsumeCommand, ConsumptionOutcome},
        expiration::{ExpirationFilter, ExpiringItem},
        inventory::{ItemUpdate, NewItem, StockFilter, StockOverview},
    },
    ApiResponse, ApiResult,
};
use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 7;

/// Body of `POST /items/{id}/consume`; the item comes from the path.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConsumeRequest {
    pub quantity: Decimal,
    #[serde(default)]
    pub reason: ConsumptionReason,
    pub note: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ExpiringQuery {
    /// Lookahead in days from today, 0 to 3650 (default 7)
    pub days: Option<i64>,
    pub category: Option<Category>,
    pub location: Option<StorageLocation>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Defaults to 50, capped at 500
    pub limit: Option<u64>,
}

/// Add an item to the pantry
#[utoipa::path(
    post,
    path = "/api/v1/items",
    request_body = NewItem,
    responses(
        (status = 201, description = "Item created", body = inventory_item::Model),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 503, description = "Store unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn add_item(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<NewItem>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.inventory.add_item(payload, actor.as_str()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item))))
}

/// Stock overview with expiry alerts and summary counts
#[utoipa::path(
    get,
    path = "/api/v1/items",
    params(StockFilter),
    responses(
        (status = 200, description = "Stock overview", body = StockOverview),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(filter): Query<StockFilter>,
) -> ApiResult<StockOverview> {
    let overview = state.services.inventory.list_items(filter).await?;
    Ok(Json(ApiResponse::success(overview)))
}

/// Get one item
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    params(("id" = i32, Path, description = "Inventory item id")),
    responses(
        (status = 200, description = "Item returned", body = inventory_item::Model),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<inventory_item::Model> {
    let item = state.services.inventory.get_item(id).await?;
    Ok(Json(ApiResponse::success(item)))
}

/// Partially update an item
#[utoipa::path(
    patch,
    path = "/api/v1/items/{id}",
    params(("id" = i32, Path, description = "Inventory item id")),
    request_body = ItemUpdate,
    responses(
        (status = 200, description = "Item updated", body = inventory_item::Model),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    Json(payload): Json<ItemUpdate>,
) -> ApiResult<inventory_item::Model> {
    let item = state
        .services
        .inventory
        .update_item(id, payload, actor.as_str())
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

/// Consume stock from an item
#[utoipa::path(
    post,
    path = "/api/v1/items/{id}/consume",
    params(("id" = i32, Path, description = "Inventory item id")),
    request_body = ConsumeRequest,
    responses(
        (status = 200, description = "Stock consumed", body = ConsumptionOutcome),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent update lost", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn consume_item(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<i32>,
    Json(payload): Json<ConsumeRequest>,
) -> ApiResult<ConsumptionOutcome> {
    let command = ConsumeCommand {
        item_id: id,
        quantity: payload.quantity,
        reason: payload.reason,
        note: payload.note,
        force: payload.force,
    };
    let outcome = state
        .services
        .consumption
        .consume(command, actor.as_str())
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Consumption events of an item, newest first
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}/consumption",
    params(("id" = i32, Path, description = "Inventory item id"), HistoryQuery),
    responses(
        (status = 200, description = "Consumption history", body = Vec<consumption_event::Model>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn consumption_history(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<consumption_event::Model>> {
    let events = state
        .services
        .inventory
        .consumption_history(id, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(events)))
}

/// In-stock items expiring within the lookahead window, soonest first
#[utoipa::path(
    get,
    path = "/api/v1/items/expiring",
    params(ExpiringQuery),
    responses(
        (status = 200, description = "Expiring items", body = Vec<ExpiringItem>),
        (status = 400, description = "Invalid lookahead", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn expiring_items(
    State(state): State<AppState>,
    Query(query): Query<ExpiringQuery>,
) -> ApiResult<Vec<ExpiringItem>> {
    let items = state
        .services
        .expiration
        .items_expiring_within(
            query.days.unwrap_or(DEFAULT_LOOKAHEAD_DAYS),
            ExpirationFilter {
                category: query.category,
                location: query.location,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(items)))
}
