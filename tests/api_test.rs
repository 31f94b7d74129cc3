mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::{json, Value};

async fn create_item(app: &TestApp, body: Value) -> Value {
    let response = app
        .request_authenticated(Method::POST, "/api/v1/items", Some(body))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await["data"].clone()
}

fn milk() -> Value {
    json!({
        "name": "Milk",
        "quantity": 2,
        "unit": "LITERS",
        "category": "DAIRY",
        "location": "FRIDGE",
        "expiration_date": "2099-01-01"
    })
}

#[tokio::test]
async fn health_and_status_do_not_need_a_key() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["checks"]["database"], "healthy");

    let response = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["service"], "pantry-api");
}

#[tokio::test]
async fn ledger_routes_require_the_api_key() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/items", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["code"], "unauthorized");

    let response = app
        .request(Method::GET, "/api/v1/tasks", None, Some("wrong-key"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request_with_headers(
            Method::GET,
            "/api/v1/tasks",
            None,
            None,
            &[("x-api-key", common::TEST_API_KEY)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn item_crud_and_consumption_over_http() {
    let app = TestApp::new().await;
    let item = create_item(&app, milk()).await;
    let id = item["id"].as_i64().expect("item id");
    assert_eq!(item["quantity"], "2");

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/items/{}", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request_as(
            "sam",
            Method::PATCH,
            &format!("/api/v1/items/{}", id),
            Some(json!({ "location": "PANTRY" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["location"], "PANTRY");
    assert_eq!(body["data"]["updated_by"], "sam");

    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/items/{}/consume", id),
            Some(json!({ "quantity": "0.5" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["remaining_quantity"], "1.5");
    assert_eq!(body["data"]["capped"], false);

    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/items/{}/consumption", id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn overdraw_returns_unprocessable_entity() {
    let app = TestApp::new().await;
    let id = create_item(&app, milk()).await["id"].as_i64().unwrap();

    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/items/{}/consume", id),
            Some(json!({ "quantity": 5 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    assert_eq!(body["code"], "insufficient_stock");
    assert_eq!(body["retryable"], false);

    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/items/{}/consume", id),
            Some(json!({ "quantity": 5, "force": true })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["consumed_quantity"], "2");
    assert_eq!(body["data"]["exhausted"], true);
}

#[tokio::test]
async fn invalid_item_payload_is_a_bad_request() {
    let app = TestApp::new().await;
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/items",
            Some(json!({
                "name": "",
                "quantity": 1,
                "unit": "PIECES",
                "category": "OTHER",
                "location": "PANTRY"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["code"], "validation_error");

    let response = app
        .request_authenticated(Method::GET, "/api/v1/items/9999", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expiring_endpoint_lists_soonest_first() {
    let app = TestApp::new().await;
    let today = chrono::Utc::now().date_naive();
    for (name, offset) in [("Ham", 5), ("Milk", 1), ("Jam", 300)] {
        let mut body = milk();
        body["name"] = json!(name);
        body["expiration_date"] = json!((today + chrono::Duration::days(offset)).to_string());
        create_item(&app, body).await;
    }

    let response = app
        .request_authenticated(Method::GET, "/api/v1/items/expiring?days=7", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Milk", "Ham"]);
    assert_eq!(body["data"][0]["days_remaining"], 1);
}

#[tokio::test]
async fn task_lifecycle_over_http() {
    let app = TestApp::new().await;
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/tasks",
            Some(json!({
                "title": "Restock water",
                "due_date": "2024-01-10",
                "recurrence": "WEEKLY"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let task = response_json(response).await["data"].clone();
    let id = task["id"].as_i64().unwrap();
    assert_eq!(task["status"], "TODO");
    assert_eq!(task["is_recurring"], true);

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/tasks/{}/status", id),
            Some(json!({ "status": "IN_PROGRESS" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request_authenticated(Method::POST, &format!("/api/v1/tasks/{}/complete", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["task"]["status"], "DONE");
    assert_eq!(body["data"]["next_occurrence"]["due_date"], "2024-01-17");
    assert_eq!(body["data"]["next_occurrence"]["parent_task_id"], id);

    let response = app
        .request_authenticated(Method::POST, &format!("/api/v1/tasks/{}/cancel", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["code"], "invalid_transition");
}

#[tokio::test]
async fn stats_search_and_operations_endpoints() {
    let app = TestApp::new().await;
    let id = create_item(&app, milk()).await["id"].as_i64().unwrap();
    app.request_authenticated(
        Method::POST,
        &format!("/api/v1/items/{}/consume", id),
        Some(json!({ "quantity": 1 })),
    )
    .await;

    let response = app
        .request_authenticated(Method::GET, "/api/v1/stats/consumption?group_by=total", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["rows"][0]["total_quantity"], "1");

    let response = app
        .request_authenticated(
            Method::GET,
            "/api/v1/stats/consumption?start=2024-02-02&end=2024-02-01",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/search?q=milk", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"][0]["id"], format!("item-{}", id));

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/documents/item-{}", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/operations?target_table=inventory_items", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let ops: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["operation"].as_str().unwrap())
        .collect();
    assert_eq!(ops, vec!["CONSUME", "INSERT"]);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = TestApp::new().await;
    let response = app
        .request_with_headers(
            Method::GET,
            "/api/v1/status",
            None,
            None,
            &[("x-request-id", "req-pantry-1")],
        )
        .await;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req-pantry-1")
    );
}
