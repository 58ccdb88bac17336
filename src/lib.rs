// SPDX-License-Identifier: Apache-2.0

//! Application Form Intake
//!
//! This crate provides the server-side intake pipeline for a single
//! talent-application form:
//!
//! - Payload validation (required fields, length and shape constraints)
//! - Honeypot and render-to-submit timing bot defenses
//! - Fixed-window rate limiting per client IP (Redis-backed, fail-open)
//! - Turnstile human-verification
//! - HTML-escaped notification mail over SMTP
//!
//! The pipeline is strictly linear per request; any failing stage
//! short-circuits the rest. All validation and bot-defense rejections
//! collapse to one generic client-facing message so probing clients learn
//! nothing about which gate tripped.

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod mailer;
pub mod validator;
pub mod verify;

pub use config::Config;
pub use error::IntakeError;
pub use limiter::{CounterStore, MemoryCounterStore, RateLimiter, RedisCounterStore};
pub use validator::{SubmissionPayload, SubmissionValidator, ValidationError};
pub use verify::TurnstileVerifier;
