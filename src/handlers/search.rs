use super::AppState;
use crate::{
    services::search::{Document, SearchHit},
    ApiResponse, ApiResult,
};
use axum::extract::{Json, Path, Query, State};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Case-insensitive substring
    pub q: String,
}

/// Search items and tasks
#[utoipa::path(
    get,
    path = "/api/v1/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching documents", body = Vec<SearchHit>),
        (status = 400, description = "Blank query", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "search"
)]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<SearchHit>> {
    let hits = state.services.search.search(&query.q).await?;
    Ok(Json(ApiResponse::success(hits)))
}

/// Fetch a full document by search id
#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}",
    params(("id" = String, Path, description = "`item-<id>` or `task-<id>`")),
    responses(
        (status = 200, description = "Document", body = Document),
        (status = 400, description = "Malformed id", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "search"
)]
pub async fn fetch_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Document> {
    let document = state.services.search.fetch(&id).await?;
    Ok(Json(ApiResponse::success(document)))
}
