// SPDX-License-Identifier: Apache-2.0

//! Application Form Intake Service
//!
//! A single-endpoint HTTP service that accepts a talent-application form
//! submission as JSON and relays it to a staff mailbox over SMTP, after:
//!
//! - Payload validation (required fields, lengths, email shape)
//! - Honeypot and render-to-submit timing bot defenses
//! - Fixed-window rate limiting per client IP (20 / 600s default)
//! - Turnstile human-verification (optional, secret-gated)
//!
//! ## Configuration
//!
//! Environment variables (a `.env` file is honoured):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `REDIS_URL`: Counter store URL; absent disables rate limiting
//! - `RATE_LIMIT_MAX` / `RATE_LIMIT_WINDOW_SECS`: Limiter tunables (20 / 600)
//! - `TURNSTILE_SECRET_KEY`: Verification secret; absent disables verification
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USER`, `SMTP_PASS`, `EMAIL_FROM`,
//!   `EMAIL_TO`: Mail transport, all six required for dispatch

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application_intake::{
    config::Config,
    handlers::{router, AppState},
    limiter::{CounterStore, RateLimiter, RedisCounterStore},
    validator::SubmissionValidator,
    verify::TurnstileVerifier,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        max_attempts = config.rate_limit.max_attempts,
        window_secs = config.rate_limit.window_secs,
        rate_limiting = config.redis_url.is_some(),
        verification = config.verify.secret.is_some(),
        mail_configured = config.mail.resolve().is_some(),
        "Starting application intake service"
    );
    if config.mail.resolve().is_none() {
        warn!("mail transport incomplete; submissions will be answered with 500 until configured");
    }

    // Counter store: Redis when configured, otherwise fail open
    let store: Option<Arc<dyn CounterStore>> = match &config.redis_url {
        Some(url) => Some(Arc::new(RedisCounterStore::new(url)?)),
        None => {
            warn!("REDIS_URL not set; rate limiting disabled");
            None
        }
    };

    // Create application state
    let state = Arc::new(AppState {
        limiter: RateLimiter::new(config.rate_limit.clone(), store),
        validator: SubmissionValidator::new(config.validation.clone()),
        verifier: TurnstileVerifier::new(config.verify.clone())?,
        config: config.clone(),
    });

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, router(state)).await?;

    Ok(())
}
