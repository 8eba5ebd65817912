#![allow(dead_code)]

use std::io::Write;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use merge_api::config::{ServerConfig, SubmissionMode};
use merge_api::router::build_app_router;
use merge_api::state::AppState;
use merge_runner::RunnerConfig;

/// Build a test `ServerConfig` that runs `runner` in the given mode.
pub fn test_config(mode: SubmissionMode, runner: RunnerConfig) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        submission_mode: mode,
        runner,
        subscriber_buffer: 64,
    }
}

/// Build the full application router plus a handle on its state, so tests
/// can drive the runner and channel directly.
pub fn build_test_app(config: ServerConfig) -> (Router, AppState) {
    let state = AppState::new(config.clone());
    let app = build_app_router(state.clone(), &config);
    (app, state)
}

/// Runner config that launches `stub` through `sh`.
pub fn stub_runner(stub: &tempfile::NamedTempFile) -> RunnerConfig {
    let script = stub.path().to_str().expect("utf-8 temp path").to_string();
    RunnerConfig::new("sh").with_args([script])
}

/// Write `body` to a temp shell script.
pub fn write_stub(body: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new()
        .suffix(".sh")
        .tempfile()
        .expect("create temp file");
    writeln!(f, "#!/bin/sh").expect("write shebang");
    write!(f, "{body}").expect("write body");
    f.flush().expect("flush stub");
    f
}

/// Stub that reports 10/55/100 and succeeds.
pub fn progress_stub() -> tempfile::NamedTempFile {
    write_stub(
        "echo 'Starting model merge...'\n\
         echo 'Progress: 10%'\n\
         echo 'Progress: 55%'\n\
         echo 'Progress: 100%'\n",
    )
}

/// A valid submission body writing to `/out`.
pub fn merge_body() -> serde_json::Value {
    serde_json::json!({
        "baseModel": "/models/base",
        "targetModel": "/models/instruct",
        "finetuneOutputs": ["/ft/a", "/ft/b"],
        "outputPath": "/out",
    })
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Body::empty()).await
}

pub async fn post_json(app: Router, uri: &str, body: &serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Body::from(body.to_string())).await
}

pub async fn send(app: Router, method: Method, uri: &str, body: Body) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
