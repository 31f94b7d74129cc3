//! Pantry API Library
//!
//! Perishable inventory and task ledgers behind a REST API and a JSON-RPC
//! tool endpoint.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tools;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer};
use utoipa::ToSchema;

use crate::middleware_helpers::{require_api_key, ApiKeyAuth};

/// Grace added on top of the command timeout before the HTTP layer gives up.
const HTTP_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub tools: tools::ToolDispatcher,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let services = handlers::AppServices::new(db.clone(), &config);
        let tools = tools::ToolDispatcher::new(services.clone());
        Self {
            db,
            config,
            services,
            tools,
        }
    }

    pub fn auth(&self) -> ApiKeyAuth {
        ApiKeyAuth::new(self.config.api_key.as_str(), self.config.default_actor.as_str())
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Versioned REST routes. Everything except health and status requires the
/// API key.
pub fn api_v1_routes(auth: ApiKeyAuth) -> Router<AppState> {
    let items = Router::new()
        .route(
            "/items",
            get(handlers::items::list_items).post(handlers::items::add_item),
        )
        .route("/items/expiring", get(handlers::items::expiring_items))
        .route(
            "/items/:id",
            get(handlers::items::get_item).patch(handlers::items::update_item),
        )
        .route("/items/:id/consume", post(handlers::items::consume_item))
        .route(
            "/items/:id/consumption",
            get(handlers::items::consumption_history),
        );

    let tasks = Router::new()
        .route(
            "/tasks",
            get(handlers::tasks::list_tasks).post(handlers::tasks::create_task),
        )
        .route(
            "/tasks/:id",
            get(handlers::tasks::get_task).patch(handlers::tasks::update_task),
        )
        .route(
            "/tasks/:id/status",
            axum::routing::put(handlers::tasks::update_task_status),
        )
        .route("/tasks/:id/complete", post(handlers::tasks::complete_task))
        .route("/tasks/:id/cancel", post(handlers::tasks::cancel_task));

    let insights = Router::new()
        .route("/stats/consumption", get(handlers::stats::consumption_stats))
        .route("/stats/tasks", get(handlers::stats::task_stats))
        .route("/search", get(handlers::search::search))
        .route("/documents/:id", get(handlers::search::fetch_document))
        .route("/operations", get(handlers::operations::list_operations));

    Router::new()
        .merge(items)
        .merge(tasks)
        .merge(insights)
        .route_layer(axum::middleware::from_fn_with_state(auth, require_api_key))
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
}

/// Full application router: REST API, tool endpoint and Swagger UI with
/// request-id, tracing, compression and timeout layers. CORS is added by
/// the binary.
pub fn app_router(state: AppState) -> Router {
    let auth = state.auth();
    let http_timeout = state.config.command_timeout() + HTTP_TIMEOUT_GRACE;

    let mcp = Router::new()
        .route("/mcp", post(tools::rpc::mcp_endpoint))
        .route_layer(axum::middleware::from_fn_with_state(
            auth.clone(),
            require_api_key,
        ));

    Router::<AppState>::new()
        .route("/", get(|| async { "pantry-api up" }))
        .nest("/api/v1", api_v1_routes(auth))
        .merge(mcp)
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(http_timeout))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let git = option_env!("GIT_HASH").unwrap_or("unknown");
    let build_time = option_env!("BUILD_TIME").unwrap_or("unknown");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "git": git,
        "build_time": build_time,
        "service": "pantry-api",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(_) => "healthy",
        Err(e) => {
            ::tracing::warn!(error = %e, "database health check failed");
            "unhealthy"
        }
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

pub mod prelude {
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::services::*;
    pub use crate::tracing::*;
}
