//! HTTP surface tests driven through the router with a scripted runner.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use shaper_api::{router, AppState};
use shaper_core::testkit::ScriptedRunner;
use shaper_core::{FixedInterfaces, Shaper, ShapingLimits};

fn app(runner: ScriptedRunner) -> axum::Router {
    let runner = Arc::new(runner);
    let shaper = Arc::new(Shaper::new(
        runner.clone(),
        Arc::new(FixedInterfaces::new(["ethA", "ethB"])),
        ShapingLimits::default(),
    ));
    router(AppState::new(shaper, runner))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn root_returns_banner() {
    let response = app(ScriptedRunner::ok())
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Traffic Shaper Server is running");
}

#[tokio::test]
async fn get_config_returns_default_intent() {
    let response = app(ScriptedRunner::ok())
        .oneshot(Request::get("/config").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["enabled"], false);
    assert_eq!(body["delay_ms"], 0);
    assert_eq!(body["bandwidth_mbps"], 1000.0);
}

#[tokio::test]
async fn update_config_applies_and_commits() {
    let app = app(ScriptedRunner::ok());
    let request = post_json(
        "/config",
        &json!({
            "enabled": true,
            "delay_ms": 50,
            "bandwidth_mbps": 10.0,
            "interface_in": "ethA",
            "interface_out": "ethB",
        }),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Bandwidth limited to 10 Mbps"));
    assert_eq!(body["config"]["enabled"], true);

    // the committed configuration is now visible to readers
    let response = app
        .oneshot(Request::get("/config").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["delay_ms"], 50);
}

#[tokio::test]
async fn invalid_delay_is_rejected_with_400() {
    let request = post_json(
        "/config",
        &json!({
            "enabled": true,
            "delay_ms": 60000,
            "bandwidth_mbps": 10.0,
            "interface_in": "ethA",
            "interface_out": "ethB",
        }),
    );
    let response = app(ScriptedRunner::ok()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("Delay"));
}

#[tokio::test]
async fn failed_apply_reports_the_failing_step() {
    // clears pass, first create fails
    let request = post_json(
        "/config",
        &json!({
            "enabled": true,
            "delay_ms": 0,
            "bandwidth_mbps": 5.0,
            "interface_in": "ethA",
            "interface_out": "ethB",
        }),
    );
    let runner = ScriptedRunner::failing_from(4, "RTNETLINK answers: Operation not permitted");
    let response = app(runner).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("Failed to apply configuration"));
    assert!(detail.contains("create HTB qdisc on ethA"));
}

#[tokio::test]
async fn reset_returns_default_config() {
    let response = app(ScriptedRunner::ok())
        .oneshot(post_json("/reset", &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["config"]["enabled"], false);
}
