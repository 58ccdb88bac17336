// SPDX-License-Identifier: Apache-2.0

//! Notification mail composition and SMTP dispatch.
//!
//! Every interpolated value is entity-escaped before it reaches the HTML
//! body, since name and handle fields are attacker-controlled. The sender
//! display name is fixed; reply-to is the applicant's address so staff can
//! answer directly. One send attempt per submission, no retries and no
//! partial sends — any transport error surfaces as a single dispatch
//! failure.

use crate::config::MailSettings;
use crate::validator::SubmissionPayload;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt::Write;
use std::time::Duration;
use thiserror::Error;

/// Fixed sender display name on outbound notifications.
const SENDER_NAME: &str = "Application Form";

/// Subject line for notification mail.
const SUBJECT: &str = "New submission";

/// Standard implicit-TLS SMTP port.
const SMTPS_PORT: u16 = 465;

/// Timeout on the SMTP conversation.
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Mail dispatch failure.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("message build error: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Escape a value for interpolation into HTML.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Outbound mail dispatcher bound to one resolved transport configuration.
pub struct MailDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl MailDispatcher {
    /// Build a dispatcher from complete mail settings.
    ///
    /// Implicit TLS on the standard SMTPS port, opportunistic STARTTLS
    /// otherwise.
    pub fn new(settings: &MailSettings) -> Result<Self, MailError> {
        let tls_params = TlsParameters::new(settings.host.clone())?;
        let tls = if settings.port == SMTPS_PORT {
            Tls::Wrapper(tls_params)
        } else {
            Tls::Opportunistic(tls_params)
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            .port(settings.port)
            .tls(tls)
            .credentials(Credentials::new(
                settings.user.clone(),
                settings.pass.clone(),
            ))
            .timeout(Some(SEND_TIMEOUT))
            .build();

        let from = Mailbox::new(
            Some(SENDER_NAME.to_string()),
            settings.from.parse::<Address>()?,
        );
        let to = settings.to.parse::<Mailbox>()?;

        Ok(Self { transport, from, to })
    }

    /// Compose the notification message for a validated payload.
    pub fn compose(
        &self,
        payload: &SubmissionPayload,
        client_ip: &str,
    ) -> Result<Message, MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .reply_to(payload.email.parse::<Mailbox>()?)
            .subject(SUBJECT)
            .header(ContentType::TEXT_HTML)
            .body(render_body(payload, client_ip))?;
        Ok(message)
    }

    /// Compose and send the notification. One attempt, no retries.
    pub async fn send(
        &self,
        payload: &SubmissionPayload,
        client_ip: &str,
    ) -> Result<(), MailError> {
        let message = self.compose(payload, client_ip)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Render the HTML notification body as ordered label/value rows.
fn render_body(payload: &SubmissionPayload, client_ip: &str) -> String {
    let onlyfans = if payload.onlyfans.is_empty() {
        "N/A"
    } else {
        payload.onlyfans.as_str()
    };

    let rows: [(&str, &str); 6] = [
        ("fullName", &payload.full_name),
        ("age", &payload.age),
        ("instagram", &payload.instagram),
        ("email", &payload.email),
        ("onlyfans", onlyfans),
        ("ip", client_ip),
    ];

    let mut body = String::from("<h2>New Application</h2>\n");
    for (label, value) in rows {
        // label is a trusted constant, but escape anyway for uniformity
        let _ = writeln!(
            body,
            "<p><strong>{}:</strong> {}</p>",
            escape_html(label),
            escape_html(value)
        );
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailSettings;

    fn settings(port: u16) -> MailSettings {
        MailSettings {
            host: "smtp.example.com".into(),
            port,
            user: "user".into(),
            pass: "pass".into(),
            from: "noreply@example.com".into(),
            to: "staff@example.com".into(),
        }
    }

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            full_name: "Jane Doe".into(),
            age: "25".into(),
            instagram: "@janedoe".into(),
            email: "jane@example.com".into(),
            onlyfans: String::new(),
            rendered_at: None,
            turnstile_token: None,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x&y")</script>"#),
            "&lt;script&gt;alert(&quot;x&amp;y&quot;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("o'brien"), "o&#39;brien");
        assert_eq!(escape_html("plain text"), "plain text");
    }

    #[test]
    fn test_body_escapes_attacker_controlled_fields() {
        let mut payload = payload();
        payload.full_name = "<script>alert(1)</script>".into();
        let body = render_body(&payload, "1.2.3.4");
        assert!(body.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!body.contains("<script>"));
    }

    #[test]
    fn test_body_rows_in_order() {
        let body = render_body(&payload(), "1.2.3.4");
        let positions: Vec<usize> = ["fullName", "age", "instagram", "email", "onlyfans", "ip"]
            .iter()
            .map(|label| body.find(&format!("{label}:")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_empty_onlyfans_renders_placeholder() {
        let body = render_body(&payload(), "1.2.3.4");
        assert!(body.contains("<strong>onlyfans:</strong> N/A"));
    }

    #[test]
    fn test_compose_sets_reply_to_and_fixed_sender() {
        let dispatcher = MailDispatcher::new(&settings(587)).unwrap();
        let message = dispatcher.compose(&payload(), "1.2.3.4").unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();

        assert!(formatted.contains("Reply-To: jane@example.com"));
        assert!(formatted.contains("\"Application Form\" <noreply@example.com>"));
        assert!(formatted.contains("To: staff@example.com"));
        assert!(formatted.contains("Subject: New submission"));
    }

    #[test]
    fn test_bad_from_address_rejected() {
        let mut bad = settings(587);
        bad.from = "not an address".into();
        assert!(matches!(
            MailDispatcher::new(&bad),
            Err(MailError::Address(_))
        ));
    }

    #[test]
    fn test_implicit_tls_port_builds() {
        // 465 selects the implicit-TLS wrapper; just assert construction works
        assert!(MailDispatcher::new(&settings(465)).is_ok());
    }
}
