mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use pantry_api::{middleware_helpers::Actor, tools::ToolName};
use serde_json::{json, Value};

fn call(id: i64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

#[tokio::test]
async fn initialize_opens_a_session_and_lists_tools() {
    let app = TestApp::new().await;
    let response = app
        .rpc(json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("mcp-session-id"));
    let body = response_json(response).await;
    assert_eq!(body["result"]["serverInfo"]["name"], "pantry-api");

    let body = response_json(
        app.rpc(json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }))
            .await,
    )
    .await;
    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 18);
    assert!(tools.iter().any(|t| t["name"] == "consume_item"));
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
}

#[tokio::test]
async fn tool_calls_reach_the_ledger() {
    let app = TestApp::new().await;
    let body = response_json(
        app.rpc(call(
            1,
            "add_item",
            json!({
                "name": "Oat milk",
                "quantity": 1,
                "unit": "LITERS",
                "category": "BEVERAGES",
                "location": "PANTRY"
            }),
        ))
        .await,
    )
    .await;
    assert_eq!(body["result"]["isError"], false);
    let item_id = body["result"]["structuredContent"]["id"].as_i64().unwrap();

    let body = response_json(
        app.rpc(call(2, "consume_item", json!({ "item_id": item_id, "quantity": 3 })))
            .await,
    )
    .await;
    assert_eq!(body["id"], 2);
    assert_eq!(body["result"]["isError"], true);
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    let payload: Value = serde_json::from_str(text).unwrap();
    assert_eq!(payload["error"], "insufficient_stock");
    assert_eq!(payload["available"], "1");

    let body = response_json(
        app.rpc(call(
            3,
            "consume_item",
            json!({ "item_id": item_id, "quantity": 3, "force": true }),
        ))
        .await,
    )
    .await;
    assert_eq!(body["result"]["isError"], false);
    assert_eq!(body["result"]["structuredContent"]["exhausted"], true);
}

#[tokio::test]
async fn protocol_errors_use_json_rpc_codes() {
    let app = TestApp::new().await;

    let response = app
        .request_with_headers(
            Method::POST,
            "/mcp",
            None,
            Some(common::TEST_API_KEY),
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], -32700);

    let body = response_json(
        app.rpc(json!({ "jsonrpc": "2.0", "id": 4, "method": "resources/list" }))
            .await,
    )
    .await;
    assert_eq!(body["error"]["code"], -32601);

    let body = response_json(app.rpc(call(5, "launch_rocket", json!({}))).await).await;
    assert_eq!(body["error"]["code"], -32601);

    let response = app
        .rpc(json!({ "jsonrpc": "1.0", "id": 6, "method": "ping" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], -32600);
}

#[tokio::test]
async fn mcp_endpoint_requires_the_api_key() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/mcp",
            Some(json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dispatcher_records_the_calling_actor() {
    let app = TestApp::new().await;
    let actor = Actor("robin".into());
    let task = app
        .state
        .tools
        .call(ToolName::InsertTask, json!({ "title": "Descale kettle" }), &actor)
        .await
        .unwrap();
    assert_eq!(task["created_by"], "robin");

    let completed = app
        .state
        .tools
        .call(ToolName::CompleteTask, json!({ "task_id": task["id"] }), &actor)
        .await
        .unwrap();
    assert_eq!(completed["task"]["status"], "DONE");
    assert!(completed["next_occurrence"].is_null());

    let log = app
        .state
        .tools
        .call(ToolName::OperationLog, json!({ "target_table": "tasks" }), &actor)
        .await
        .unwrap();
    let entries = log.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e["actor"] == "robin"));
}
