use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pantry API",
        version = "0.1.0",
        description = r#"
# Pantry API

Household ledger for perishable inventory and recurring chores.

## Features

- **Inventory**: items with quantity, unit, category, storage location and expiry
- **Consumption**: guarded stock depletion with an immutable event history
- **Expiration**: in-stock items expiring within a lookahead window
- **Tasks**: TODO → IN_PROGRESS → DONE lifecycle with daily, weekly and monthly recurrence
- **Statistics**: consumption and task summaries over a date window
- **Audit**: every mutation is appended to the operation log

## Authentication

Send the API key in the Authorization header, optionally with the acting user's name:

```
Authorization: Bearer <api-key>
X-Actor: alex
```

## Errors

Failures use one body shape with a stable `code`:

```json
{
  "error": "Unprocessable Entity",
  "code": "insufficient_stock",
  "message": "Insufficient stock for item 4: requested 3, available 1",
  "retryable": false,
  "timestamp": "2024-01-01T00:00:00Z"
}
```

Only `unavailable` (503) is retryable.
"#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "items", description = "Inventory and consumption endpoints"),
        (name = "tasks", description = "Task lifecycle endpoints"),
        (name = "statistics", description = "Aggregated summaries"),
        (name = "search", description = "Free-text search and document fetch"),
        (name = "operations", description = "Audit trail"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::items::add_item,
        crate::handlers::items::list_items,
        crate::handlers::items::get_item,
        crate::handlers::items::update_item,
        crate::handlers::items::consume_item,
        crate::handlers::items::consumption_history,
        crate::handlers::items::expiring_items,

        crate::handlers::tasks::create_task,
        crate::handlers::tasks::list_tasks,
        crate::handlers::tasks::get_task,
        crate::handlers::tasks::update_task,
        crate::handlers::tasks::update_task_status,
        crate::handlers::tasks::complete_task,
        crate::handlers::tasks::cancel_task,

        crate::handlers::stats::consumption_stats,
        crate::handlers::stats::task_stats,

        crate::handlers::search::search,
        crate::handlers::search::fetch_document,

        crate::handlers::operations::list_operations,
    ),
    components(
        schemas(
            crate::entities::inventory_item::Model,
            crate::entities::consumption_event::Model,
            crate::entities::task::Model,
            crate::entities::operation_log::Model,
            crate::entities::Unit,
            crate::entities::Category,
            crate::entities::StorageLocation,
            crate::entities::ConsumptionReason,
            crate::entities::TaskPriority,
            crate::entities::TaskStatus,
            crate::entities::RecurrenceFrequency,
            crate::entities::OperationKind,

            crate::services::inventory::NewItem,
            crate::services::inventory::ItemUpdate,
            crate::services::inventory::StockOverview,
            crate::services::inventory::StockEntry,
            crate::services::inventory::StockSummary,
            crate::services::inventory::ExpiryAlert,
            crate::services::consumption::ConsumptionOutcome,
            crate::services::expiration::ExpiringItem,
            crate::services::expiration::ExpiryUrgency,
            crate::services::tasks::NewTask,
            crate::services::tasks::TaskUpdate,
            crate::services::tasks::TaskTransition,
            crate::services::statistics::StatsWindow,
            crate::services::statistics::ConsumptionGroupBy,
            crate::services::statistics::TaskGroupBy,
            crate::services::statistics::ConsumptionStats,
            crate::services::statistics::ConsumptionStatRow,
            crate::services::statistics::TaskStats,
            crate::services::statistics::TaskStatRow,
            crate::services::search::SearchHit,
            crate::services::search::Document,

            crate::handlers::items::ConsumeRequest,
            crate::handlers::tasks::StatusChangeRequest,
            crate::handlers::tasks::CancelRequest,

            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon),
    security(("bearer_auth" = []), ("api_key" = []))
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
