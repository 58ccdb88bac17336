// SPDX-License-Identifier: Apache-2.0

//! Submission payload validator.
//!
//! Turns an untrusted JSON value into a typed, trimmed [`SubmissionPayload`]
//! or a machine-oriented rejection reason. Checks run in a fixed order and
//! the first failure wins:
//!
//! 1. Non-null object check
//! 2. Required-field presence (fullName, age, instagram, email)
//! 3. Per-field shape/length constraints
//! 4. Honeypot (checked last, so a filled decoy reads like any other
//!    rejection from the outside)
//!
//! The reasons produced here are for internal diagnostics only; the
//! orchestrator collapses every variant into one generic client message.

use crate::config::ValidationConfig;
use serde_json::Value;
use thiserror::Error;

/// Required fields, in the order they are checked and reported.
pub const REQUIRED_FIELDS: [&str; 4] = ["fullName", "age", "instagram", "email"];

/// Validation rejection reasons. Never echoed to clients.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid payload")]
    NotAnObject,

    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("Invalid {0}")]
    InvalidField(&'static str),

    #[error("Bot")]
    Honeypot,
}

/// A validated, trimmed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPayload {
    pub full_name: String,
    /// Kept as the original string for the notification mail; guaranteed to
    /// parse to an integer within the configured age bounds.
    pub age: String,
    pub instagram: String,
    pub email: String,
    /// Empty when the applicant left the field blank.
    pub onlyfans: String,
    /// Client-reported form render timestamp, ms since epoch.
    pub rendered_at: Option<i64>,
    pub turnstile_token: Option<String>,
}

/// Submission validator.
pub struct SubmissionValidator {
    config: ValidationConfig,
}

impl SubmissionValidator {
    /// Create a new validator with the given configuration.
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate an untrusted JSON value into a typed payload.
    ///
    /// Deterministic and side-effect free; never panics on foreign shapes.
    pub fn validate(&self, raw: &Value) -> Result<SubmissionPayload, ValidationError> {
        let obj = raw.as_object().ok_or(ValidationError::NotAnObject)?;

        let full_name = str_field(obj, "fullName");
        let age = str_field(obj, "age");
        let instagram = str_field(obj, "instagram");
        let email = str_field(obj, "email");
        let onlyfans = str_field(obj, "onlyfans");
        // Honeypot is deliberately not trimmed: whitespace is still a fill.
        let honeypot = obj
            .get("honeypot")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let rendered_at = obj.get("renderedAt").and_then(Value::as_i64);
        let turnstile_token = obj
            .get("turnstileToken")
            .and_then(Value::as_str)
            .map(str::to_string);

        for (name, value) in REQUIRED_FIELDS
            .into_iter()
            .zip([&full_name, &age, &instagram, &email])
        {
            if value.is_empty() {
                return Err(ValidationError::MissingField(name));
            }
        }

        if full_name.chars().count() > self.config.max_name_len {
            return Err(ValidationError::InvalidField("name"));
        }

        let age_num: u32 = age
            .parse()
            .map_err(|_| ValidationError::InvalidField("age"))?;
        if age_num < self.config.min_age || age_num > self.config.max_age {
            return Err(ValidationError::InvalidField("age"));
        }

        if instagram.chars().count() > self.config.max_handle_len {
            return Err(ValidationError::InvalidField("instagram"));
        }

        if email.chars().count() > self.config.max_email_len || !is_email(&email) {
            return Err(ValidationError::InvalidField("email"));
        }

        if !onlyfans.is_empty() && onlyfans.chars().count() > self.config.max_handle_len {
            return Err(ValidationError::InvalidField("onlyfans"));
        }

        if !honeypot.is_empty() {
            return Err(ValidationError::Honeypot);
        }

        Ok(SubmissionPayload {
            full_name,
            age,
            instagram,
            email,
            onlyfans,
            rendered_at,
            turnstile_token,
        })
    }

    /// Render-to-submit timing heuristic.
    ///
    /// True iff the payload carries a render timestamp and less than the
    /// configured minimum has elapsed since. An absent timestamp means the
    /// check does not apply, not that it passes. The timestamp is
    /// client-reported, so this only raises the bar against naive bots.
    pub fn submitted_too_fast(&self, payload: &SubmissionPayload, now_ms: i64) -> bool {
        match payload.rendered_at {
            Some(rendered_at) => now_ms - rendered_at < self.config.min_render_to_submit_ms,
            None => false,
        }
    }
}

/// Extract a string field, trimmed; absent or non-string values coerce to
/// an empty string rather than failing.
fn str_field(obj: &serde_json::Map<String, Value>, name: &str) -> String {
    obj.get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Simple `local@domain.tld` shape check. Not RFC 5322; just enough to
/// reject obviously unreplyable addresses.
fn is_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((head, tld)) => !head.is_empty() && !tld.is_empty(),
        None => false,
    }
}
