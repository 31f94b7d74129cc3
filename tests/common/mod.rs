#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::NaiveDate;
use pantry_api::{
    config::AppConfig,
    db,
    entities::{Category, StorageLocation, Unit},
    handlers::AppServices,
    services::{inventory::NewItem, tasks::NewTask},
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::ConnectionTrait;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_API_KEY: &str = "pantry-test-api-key-0123456789";

/// Application harness backed by a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _db_dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("pantry_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_API_KEY.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;
        cfg.default_actor = "tester".to_string();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = pantry_api::app_router(state.clone());

        Self {
            router,
            state,
            _db_dir: db_dir,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    /// Send a request against the router with an optional API key.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        api_key: Option<&str>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, api_key, &[]).await
    }

    /// Convenience helper for authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(TEST_API_KEY)).await
    }

    /// Authenticated request on behalf of a named actor.
    pub async fn request_as(
        &self,
        actor: &str,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, Some(TEST_API_KEY), &[("x-actor", actor)])
            .await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        api_key: Option<&str>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("authorization", format!("Bearer {}", key));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// POST a JSON-RPC message to `/mcp`.
    pub async fn rpc(&self, message: Value) -> axum::response::Response {
        self.request_authenticated(Method::POST, "/mcp", Some(message))
            .await
    }

    /// Runs raw SQL against the test database, e.g. to install a failing trigger.
    pub async fn execute_sql(&self, sql: &str) {
        self.state
            .db
            .execute_unprepared(sql)
            .await
            .expect("execute raw test sql");
    }

    pub async fn seed_item(&self, name: &str, quantity: Decimal, expires: Option<NaiveDate>) -> i32 {
        let mut input = new_item(name, quantity);
        input.expiration_date = expires;
        self.services()
            .inventory
            .add_item(input, "tester")
            .await
            .expect("seed inventory item")
            .id
    }
}

/// Reads a response body as JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid calendar date")
}

pub fn new_item(name: &str, quantity: Decimal) -> NewItem {
    NewItem {
        name: name.to_string(),
        quantity,
        unit: Unit::Pieces,
        category: Category::Dairy,
        location: StorageLocation::Fridge,
        expiration_date: None,
        opened_date: None,
        purchase_price: None,
        supplier: None,
        lot_code: None,
    }
}

pub fn new_task(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: None,
        priority: None,
        due_date: None,
        assignee: None,
        recurring: None,
        recurrence: None,
    }
}
