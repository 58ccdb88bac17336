// SPDX-License-Identifier: Apache-2.0

//! HTTP handlers and request orchestration.
//!
//! One endpoint does the work: `POST /api/apply` runs the intake pipeline
//! in a fixed order, and any failing stage short-circuits the rest:
//!
//! rate limiter → body-size gate → JSON parse → validator → bot timing →
//! human-verification → mail-config check → dispatch.

use crate::config::Config;
use crate::error::IntakeError;
use crate::limiter::RateLimiter;
use crate::mailer::MailDispatcher;
use crate::validator::SubmissionValidator;
use crate::verify::TurnstileVerifier;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Sentinel client key when no forwarding header is present.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Coarse transport-level body cap, above the application-level gate so the
/// precise 413 path in the handler still decides for declared sizes in
/// between.
const TRANSPORT_BODY_LIMIT: usize = 64 * 1024;

/// Shared application state.
pub struct AppState {
    pub limiter: RateLimiter,
    pub validator: SubmissionValidator,
    pub verifier: TurnstileVerifier,
    pub config: Config,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/apply", post(submit))
        .layer(DefaultBodyLimit::max(TRANSPORT_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "application-intake",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Resolve the client address from forwarding headers: first entry of
/// `x-forwarded-for` if present, else a sentinel.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Declared body size from the Content-Length header, if parseable.
fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Application form submission endpoint.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ip = client_ip(&headers);

    if !state.limiter.allow(&ip).await {
        info!(client = %ip, "submission rate limited");
        return IntakeError::TooManyRequests.into_response();
    }

    // Size gates before any parsing: declared size first, then actual.
    let max = state.config.max_body_bytes;
    if declared_length(&headers).is_some_and(|len| len > max) || body.len() > max {
        info!(client = %ip, declared = ?declared_length(&headers), actual = body.len(), "payload too large");
        return IntakeError::PayloadTooLarge.into_response();
    }

    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(err) => {
            info!(client = %ip, error = %err, "body is not valid JSON");
            return IntakeError::InvalidJson.into_response();
        }
    };

    let payload = match state.validator.validate(&raw) {
        Ok(payload) => payload,
        Err(reason) => {
            // Internal reason stays in the logs; the client sees the
            // generic message regardless of which rule tripped.
            info!(client = %ip, reason = %reason, "submission failed validation");
            return IntakeError::InvalidSubmission.into_response();
        }
    };

    let now_ms = chrono::Utc::now().timestamp_millis();
    if state.validator.submitted_too_fast(&payload, now_ms) {
        info!(client = %ip, rendered_at = ?payload.rendered_at, "submission arrived too fast");
        return IntakeError::InvalidSubmission.into_response();
    }

    if !state
        .verifier
        .verify(payload.turnstile_token.as_deref(), &ip)
        .await
    {
        info!(client = %ip, "human verification failed");
        return IntakeError::InvalidSubmission.into_response();
    }

    let Some(settings) = state.config.mail.resolve() else {
        error!("mail transport not configured; submissions cannot be delivered");
        return IntakeError::Misconfigured.into_response();
    };

    let dispatcher = match MailDispatcher::new(&settings) {
        Ok(dispatcher) => dispatcher,
        Err(err) => {
            error!(error = %err, "mail transport setup failed");
            return IntakeError::SendFailed.into_response();
        }
    };

    match dispatcher.send(&payload, &ip).await {
        Ok(()) => {
            info!(client = %ip, "application relayed to staff mailbox");
            (axum::http::StatusCode::OK, Json(json!({ "message": "OK" }))).into_response()
        }
        Err(err) => {
            warn!(client = %ip, error = %err, "mail dispatch failed");
            IntakeError::SendFailed.into_response()
        }
    }
}
