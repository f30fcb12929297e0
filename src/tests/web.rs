use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

use crate::web::{router, SharedState};

use super::{create_app_with, sample_tree, tag};

const REACT: &str = "https://github.com/facebook/react";

fn server() -> (Router, crate::app::App, tempfile::TempDir) {
    let (app, tmp) = create_app_with(Some(sample_tree()), "search:\n  debounce_ms: 0\n");
    tag(&app, REACT, &["react", "framework"]);
    (router(SharedState::new(app.clone(), None)), app, tmp)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    };
    send(router, request.unwrap()).await
}

async fn upload(router: &Router, content_type: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/import")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_session_flow() {
    let (router, _app, _tmp) = server();

    let (status, opened) = call(&router, Method::POST, "/api/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = opened["id"].as_str().unwrap().to_string();
    let path = |action: &str| format!("/api/sessions/{id}/{action}");

    let (status, outcome) = call(&router, Method::POST, &path("input"), Some(json!({"text": "@all"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["kind"], "results");
    assert_eq!(outcome["results"].as_array().unwrap().len(), 4);

    let (_, moved) = call(&router, Method::POST, &path("move"), Some(json!({"delta": -1}))).await;
    assert_eq!(moved, json!({"index": 3}));

    let (_, hovered) = call(&router, Method::POST, &path("hover"), Some(json!({"index": 1}))).await;
    assert_eq!(hovered, json!({"index": 1}));

    let (status, snapshot) = call(&router, Method::GET, &path("selection"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["state"], "populated");
    assert_eq!(snapshot["index"], 1);
    assert_eq!(snapshot["results"][3]["url"], REACT);

    let (status, tags) = call(
        &router,
        Method::POST,
        &path("tags/add"),
        Some(json!({"url": REACT, "tag": "ui"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tags, json!({"tags": ["react", "framework", "ui"]}));

    let (status, error) = call(
        &router,
        Method::POST,
        &path("tags/add"),
        Some(json!({"url": REACT, "tag": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["error"].as_str().unwrap().contains("tag"));

    let (status, opened) = call(&router, Method::POST, &path("open"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opened, json!({"url": "https://vuejs.org"}));

    // opening ends the session
    let (status, _) = call(&router, Method::GET, &path("selection"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_open_without_selection_keeps_session() {
    let (router, _app, _tmp) = server();

    let (_, opened) = call(&router, Method::POST, "/api/sessions", None).await;
    let id = opened["id"].as_str().unwrap().to_string();

    let (status, opened) = call(&router, Method::POST, &format!("/api/sessions/{id}/open"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opened, json!({"url": null}));

    let (status, snapshot) = call(&router, Method::GET, &format!("/api/sessions/{id}/selection"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["state"], "idle");

    let (status, _) = call(&router, Method::DELETE, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&router, Method::DELETE, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_import_upload() {
    let (router, app, _tmp) = server();

    let (status, error) = upload(&router, "text/plain", "https://a.com").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(error["error"].as_str().unwrap().contains("text/plain"));

    let (status, _) = upload(&router, "application/json", r#"[{"title": "broken"}]"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = json!([
        {"title": "Axum", "url": "https://github.com/tokio-rs/axum", "tags": ["rust", "web"]},
        {"title": "Tokio", "url": "https://tokio.rs"}
    ]);
    let (status, report) = upload(&router, "application/json; charset=utf-8", &body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report, json!({"imported": 2, "failed": 0}));

    assert_eq!(
        app.library()
            .tags()
            .get_tags("https://github.com/tokio-rs/axum")
            .unwrap(),
        vec!["rust", "web"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_create_bookmark() {
    let (router, app, _tmp) = server();

    let (status, record) = call(
        &router,
        Method::POST,
        "/api/bookmarks",
        Some(json!({"title": "Hyper", "url": "https://hyper.rs", "no_tag": true})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["url"], "https://hyper.rs");
    assert_eq!(record["title"], "Hyper");

    let records = app.library().records().unwrap();
    assert!(records.iter().any(|r| r.url == "https://hyper.rs"));
    assert!(app.library().tags().get("https://hyper.rs").unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_session() {
    let (router, _app, _tmp) = server();

    let (status, error) = call(
        &router,
        Method::POST,
        "/api/sessions/nope/input",
        Some(json!({"text": "react"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error, json!({"error": "session not found"}));
}

#[tokio::test(start_paused = true)]
async fn test_idle_sessions_expire() {
    let (app, _tmp) = create_app_with(Some(sample_tree()), "search:\n  debounce_ms: 0\n");
    let state = SharedState::new(app, None);
    let router = router(state.clone());

    let (_, idle) = call(&router, Method::POST, "/api/sessions", None).await;
    let idle = idle["id"].as_str().unwrap().to_string();
    let (_, busy) = call(&router, Method::POST, "/api/sessions", None).await;
    let busy = busy["id"].as_str().unwrap().to_string();

    tokio::time::advance(Duration::from_secs(20 * 60)).await;
    let (status, _) = call(&router, Method::GET, &format!("/api/sessions/{busy}/selection"), None).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::advance(Duration::from_secs(15 * 60)).await;
    assert_eq!(state.expire_idle(Duration::from_secs(30 * 60)).await, 1);

    let (status, _) = call(&router, Method::GET, &format!("/api/sessions/{idle}/selection"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&router, Method::GET, &format!("/api/sessions/{busy}/selection"), None).await;
    assert_eq!(status, StatusCode::OK);
}
