// SPDX-License-Identifier: Apache-2.0

//! Configuration for the intake service.
//!
//! Everything is environment-sourced (with `.env` support via dotenvy).
//! Rate-limit and validation tunables carry defaults; mail transport
//! settings have none and are checked for completeness per request so a
//! partially configured deployment answers 500 instead of dropping
//! submissions silently.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Turnstile siteverify endpoint.
pub const DEFAULT_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Maximum accepted request body size in bytes (default: 50_000)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Redis connection URL; absent disables rate limiting (fail open)
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Payload validation configuration
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Human-verification configuration
    #[serde(default)]
    pub verify: VerifyConfig,

    /// Mail transport configuration
    #[serde(default)]
    pub mail: MailConfig,
}

/// Fixed-window rate limit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum attempts per window per client IP (default: 20)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Window length in seconds, armed on the first hit (default: 600)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

/// Payload constraint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum full-name length after trimming (default: 120)
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,

    /// Maximum social-handle length (default: 60)
    #[serde(default = "default_max_handle_len")]
    pub max_handle_len: usize,

    /// Maximum email length (default: 254)
    #[serde(default = "default_max_email_len")]
    pub max_email_len: usize,

    /// Inclusive minimum age (default: 18)
    #[serde(default = "default_min_age")]
    pub min_age: u32,

    /// Inclusive maximum age (default: 99)
    #[serde(default = "default_max_age")]
    pub max_age: u32,

    /// Minimum render-to-submit elapsed time in milliseconds (default: 3000);
    /// submissions arriving faster are treated as automated
    #[serde(default = "default_min_render_ms")]
    pub min_render_to_submit_ms: i64,
}

/// Turnstile verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Shared secret; absent disables verification entirely
    #[serde(default)]
    pub secret: Option<String>,

    /// Siteverify endpoint URL
    #[serde(default = "default_verify_url")]
    pub endpoint: String,
}

/// SMTP transport settings. All six values are required for dispatch;
/// `resolve` yields them only when the set is complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_pass: Option<String>,
    #[serde(default)]
    pub email_from: Option<String>,
    #[serde(default)]
    pub email_to: Option<String>,
}

/// Fully resolved mail settings, only constructible from a complete config.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
    pub to: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_body_bytes() -> usize {
    50_000
}

fn default_max_attempts() -> u32 {
    20
}

fn default_window_secs() -> u64 {
    600
}

fn default_max_name_len() -> usize {
    120
}

fn default_max_handle_len() -> usize {
    60
}

fn default_max_email_len() -> usize {
    254
}

fn default_min_age() -> u32 {
    18
}

fn default_max_age() -> u32 {
    99
}

fn default_min_render_ms() -> i64 {
    3000
}

fn default_verify_url() -> String {
    DEFAULT_VERIFY_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
            redis_url: None,
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
            verify: VerifyConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            window_secs: default_window_secs(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_name_len: default_max_name_len(),
            max_handle_len: default_max_handle_len(),
            max_email_len: default_max_email_len(),
            min_age: default_min_age(),
            max_age: default_max_age(),
            min_render_to_submit_ms: default_min_render_ms(),
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            secret: None,
            endpoint: default_verify_url(),
        }
    }
}

impl RateLimitConfig {
    /// Get the window duration
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl MailConfig {
    /// Resolve the six required transport values, or `None` if any is missing.
    pub fn resolve(&self) -> Option<MailSettings> {
        Some(MailSettings {
            host: self.smtp_host.clone().filter(|v| !v.is_empty())?,
            port: self.smtp_port.filter(|p| *p != 0)?,
            user: self.smtp_user.clone().filter(|v| !v.is_empty())?,
            pass: self.smtp_pass.clone().filter(|v| !v.is_empty())?,
            from: self.email_from.clone().filter(|v| !v.is_empty())?,
            to: self.email_to.clone().filter(|v| !v.is_empty())?,
        })
    }
}

impl Config {
    /// Load configuration from environment variables (reading `.env` first).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            bind_addr: env_var("BIND_ADDR").unwrap_or_else(default_bind_addr),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or_else(default_max_body_bytes),
            redis_url: env_var("REDIS_URL"),
            rate_limit: RateLimitConfig {
                max_attempts: env_parse("RATE_LIMIT_MAX").unwrap_or_else(default_max_attempts),
                window_secs: env_parse("RATE_LIMIT_WINDOW_SECS")
                    .unwrap_or_else(default_window_secs),
            },
            validation: ValidationConfig::default(),
            verify: VerifyConfig {
                secret: env_var("TURNSTILE_SECRET_KEY"),
                endpoint: env_var("TURNSTILE_VERIFY_URL").unwrap_or_else(default_verify_url),
            },
            mail: MailConfig {
                smtp_host: env_var("SMTP_HOST"),
                smtp_port: env_parse("SMTP_PORT"),
                smtp_user: env_var("SMTP_USER"),
                smtp_pass: env_var("SMTP_PASS"),
                email_from: env_var("EMAIL_FROM"),
                email_to: env_var("EMAIL_TO"),
            },
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|v| v.parse().ok())
}
