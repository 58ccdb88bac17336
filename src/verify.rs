// SPDX-License-Identifier: Apache-2.0

//! Turnstile human-verification client.
//!
//! Verification is optional infrastructure: with no secret configured the
//! check is a no-op that always passes. With a secret configured the check
//! fails closed — a missing token, a non-success HTTP status, an
//! undecodable body, or a missing success flag all reject the submission.
//! No retries; a transient failure just means the applicant resubmits.

use crate::config::VerifyConfig;
use crate::handlers::UNKNOWN_CLIENT;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout on the siteverify call so a slow dependency cannot hold the
/// request indefinitely.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    #[serde(default)]
    success: bool,
}

/// Client for the external challenge-verification service.
pub struct TurnstileVerifier {
    http: reqwest::Client,
    config: VerifyConfig,
}

impl TurnstileVerifier {
    /// Create a verifier. Fails only if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: VerifyConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(VERIFY_TIMEOUT).build()?;
        Ok(Self { http, config })
    }

    /// Verify a submission token against the configured secret.
    pub async fn verify(&self, token: Option<&str>, client_ip: &str) -> bool {
        let Some(secret) = &self.config.secret else {
            return true;
        };

        let Some(token) = token else {
            debug!(client = %client_ip, "verification token missing");
            return false;
        };

        let mut form = vec![("secret", secret.as_str()), ("response", token)];
        if client_ip != UNKNOWN_CLIENT {
            form.push(("remoteip", client_ip));
        }

        let response = match self.http.post(&self.config.endpoint).form(&form).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(client = %client_ip, error = %err, "siteverify request failed");
                return false;
            }
        };

        if !response.status().is_success() {
            warn!(client = %client_ip, status = %response.status(), "siteverify returned non-success");
            return false;
        }

        match response.json::<SiteverifyResponse>().await {
            Ok(body) => {
                debug!(client = %client_ip, success = body.success, "siteverify result");
                body.success
            }
            Err(err) => {
                warn!(client = %client_ip, error = %err, "siteverify body undecodable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier(secret: Option<&str>) -> TurnstileVerifier {
        TurnstileVerifier::new(VerifyConfig {
            secret: secret.map(str::to_string),
            ..VerifyConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_no_secret_always_passes() {
        let verifier = verifier(None);
        assert!(verifier.verify(None, "1.2.3.4").await);
        assert!(verifier.verify(Some("anything"), UNKNOWN_CLIENT).await);
    }

    #[tokio::test]
    async fn test_secret_without_token_fails_closed() {
        let verifier = verifier(Some("secret-key"));
        assert!(!verifier.verify(None, "1.2.3.4").await);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_closed() {
        let verifier = TurnstileVerifier::new(VerifyConfig {
            secret: Some("secret-key".into()),
            endpoint: "http://127.0.0.1:1/siteverify".into(),
        })
        .unwrap();
        assert!(!verifier.verify(Some("token"), "1.2.3.4").await);
    }

    #[test]
    fn test_success_flag_defaults_to_false() {
        let body: SiteverifyResponse = serde_json::from_str("{}").unwrap();
        assert!(!body.success);

        let body: SiteverifyResponse =
            serde_json::from_str(r#"{"success": true, "hostname": "example.com"}"#).unwrap();
        assert!(body.success);
    }
}
