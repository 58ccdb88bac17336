// SPDX-License-Identifier: Apache-2.0

//! Client-facing error taxonomy.
//!
//! Validation, bot-defense, and verification failures all map to the same
//! `InvalidSubmission` variant: the specific internal reason is logged, but
//! a probing client must not be able to distinguish which gate tripped.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Terminal intake outcomes other than success.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Too many requests")]
    TooManyRequests,

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Invalid JSON")]
    InvalidJson,

    /// Generic rejection covering validation, bot timing, and verification.
    #[error("Invalid submission")]
    InvalidSubmission,

    /// Mail transport secrets incomplete; operator error, not user error.
    #[error("Server misconfigured")]
    Misconfigured,

    #[error("Failed to send")]
    SendFailed,
}

impl IntakeError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidJson | Self::InvalidSubmission => StatusCode::BAD_REQUEST,
            Self::Misconfigured | Self::SendFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
