//! HTTP-level integration tests for the SparkQ router: prove the handlers
//! wired in `routes::router()` actually reach the scheduling core and
//! come back through the `ApiResponse` envelope.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use sparkq_db::pool::connect_in_memory;
use sparkq_server::{build_router, AppState};
use tower::ServiceExt;

async fn test_app() -> axum::Router {
    let pool = connect_in_memory().await.expect("pool");
    let state = AppState::new(pool, "demo", "/tmp/demo").await.expect("app state");
    build_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

#[tokio::test]
async fn health_check_returns_ok() {
    let app = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn session_queue_task_happy_path() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/sessions", json!({ "name": "demo" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let session_id = body["data"]["id"].as_str().expect("session id").to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/queues",
            json!({ "session_id": session_id, "name": "default", "instructions": "run bash" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let queue_id = body["data"]["id"].as_str().expect("queue id").to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/tasks",
            json!({ "queue_id": queue_id, "tool_name": "run-bash", "task_class": "MEDIUM_SCRIPT" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "queued");
    assert_eq!(body["data"]["timeout"], 600);
    let task_id = body["data"]["id"].as_str().expect("task id").to_string();

    let response = app
        .clone()
        .oneshot(json_request("POST", "/tasks/claim", json!({ "queue_id": queue_id })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["task"]["id"], task_id);
    assert_eq!(body["data"]["task"]["status"], "running");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/tasks/{task_id}/complete"),
            json!({ "result_summary": "ok" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "succeeded");

    let response = app
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["sessions"], 1);
    assert_eq!(body["data"]["queues"], 1);
}

#[tokio::test]
async fn claiming_from_empty_queue_returns_absent_task() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/sessions", json!({ "name": "s" })))
        .await
        .unwrap();
    let session_id = body_json(response).await["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request("POST", "/queues", json!({ "session_id": session_id, "name": "empty" })))
        .await
        .unwrap();
    let queue_id = body_json(response).await["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(json_request("POST", "/tasks/claim", json!({ "queue_id": queue_id })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["data"]["task"].is_null());
}

#[tokio::test]
async fn put_entry_round_trips_a_scalar_string_value() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(json_request("PUT", "/config/server/host", json!({ "value": "0.0.0.0" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/config").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["server"]["host"], "0.0.0.0");

    let response = app
        .oneshot(Request::builder().uri("/config/server/host").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["value"], "0.0.0.0");
}

#[tokio::test]
async fn put_entry_round_trips_a_feature_flag() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/config/features.flags/experimental_widget",
            json!({ "value": "true" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/config/features.flags/experimental_widget").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["value"], "true");
}

#[tokio::test]
async fn getting_unknown_task_is_not_found() {
    let app = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/tasks/tsk_doesnotexist").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
