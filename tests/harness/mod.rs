// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for intake integration tests.

#![allow(dead_code)] // not every test file uses every helper

use application_intake::config::Config;
use application_intake::handlers::{router, AppState};
use application_intake::limiter::{CounterStore, MemoryCounterStore, RateLimiter};
use application_intake::validator::SubmissionValidator;
use application_intake::verify::TurnstileVerifier;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Base test configuration: no redis, no turnstile secret, incomplete mail.
pub fn base_config() -> Config {
    Config::default()
}

/// A configuration whose six mail settings are complete but point at a
/// closed local port, so dispatch fails fast without touching the network.
pub fn config_with_unreachable_mail() -> Config {
    let mut config = base_config();
    config.mail.smtp_host = Some("127.0.0.1".into());
    config.mail.smtp_port = Some(1);
    config.mail.smtp_user = Some("user".into());
    config.mail.smtp_pass = Some("pass".into());
    config.mail.email_from = Some("noreply@example.com".into());
    config.mail.email_to = Some("staff@example.com".into());
    config
}

/// Build the router under test.
pub fn app(config: Config, store: Option<Arc<dyn CounterStore>>) -> Router {
    let state = Arc::new(AppState {
        limiter: RateLimiter::new(config.rate_limit.clone(), store),
        validator: SubmissionValidator::new(config.validation.clone()),
        verifier: TurnstileVerifier::new(config.verify.clone()).expect("http client"),
        config,
    });
    router(state)
}

/// Router with in-memory rate limiting enabled.
pub fn app_with_memory_limiter(config: Config) -> Router {
    app(config, Some(Arc::new(MemoryCounterStore::new())))
}

/// A submission that passes every validation rule.
pub fn valid_submission() -> Value {
    json!({
        "fullName": "Jane Doe",
        "age": "25",
        "instagram": "@janedoe",
        "email": "jane@example.com",
    })
}

/// POST a raw body to /api/apply from the given client address.
pub async fn post_raw(app: Router, body: impl Into<Body>, ip: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/apply")
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .body(body.into())
        .expect("request");

    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// POST a JSON submission to /api/apply.
pub async fn post_apply(app: Router, submission: &Value, ip: &str) -> (StatusCode, Value) {
    post_raw(app, submission.to_string(), ip).await
}
