//! Email notification delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport. If `SMTP_HOST`
//! is unset, [`EmailConfig::from_env`] returns `None` and email is skipped.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use scholarship_core::event_types;

use crate::bus::PlatformEvent;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FROM_ADDRESS: &str = "scholarships@noreply.local";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load from the environment; `None` when `SMTP_HOST` is not set.
    ///
    /// | Variable        | Default                       |
    /// |-----------------|-------------------------------|
    /// | `SMTP_HOST`     | required                      |
    /// | `SMTP_PORT`     | `587`                         |
    /// | `SMTP_FROM`     | `scholarships@noreply.local`  |
    /// | `SMTP_USER`     | none                          |
    /// | `SMTP_PASSWORD` | none                          |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok().filter(|h| !h.is_empty())?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends notification emails over a pooled STARTTLS transport.
pub struct EmailDelivery {
    from_address: String,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailDelivery {
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port);
        if let (Some(user), Some(pass)) = (config.smtp_user, config.smtp_password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }
        Ok(Self {
            from_address: config.from_address,
            mailer: builder.build(),
        })
    }

    /// Send the notification email for `event` to one recipient.
    pub async fn deliver(&self, to_email: &str, event: &PlatformEvent) -> Result<(), EmailError> {
        let (subject, body) = compose(event);
        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.mailer.send(email).await?;

        tracing::info!(to = to_email, event_type = %event.event_type, "Notification email sent");
        Ok(())
    }
}

/// Subject and plain-text body for an event.
pub fn compose(event: &PlatformEvent) -> (String, String) {
    let title = event_types::title_for(&event.event_type);
    let subject = format!("[Scholarships] {title}");

    let mut body = format!("{title}\n\nTime: {}\n", event.timestamp.format("%Y-%m-%d %H:%M UTC"));
    if let Some(message) = event.payload.get("message").and_then(|m| m.as_str()) {
        body.push_str(&format!("\n{message}\n"));
    }
    if let Some(obj) = event.payload.as_object() {
        let details: Vec<String> = obj
            .iter()
            .filter(|(k, v)| k.as_str() != "message" && !v.is_object() && !v.is_array())
            .map(|(k, v)| match v.as_str() {
                Some(s) => format!("{k}: {s}"),
                None => format!("{k}: {v}"),
            })
            .collect();
        if !details.is_empty() {
            body.push_str("\nDetails:\n");
            for line in details {
                body.push_str(&format!("  {line}\n"));
            }
        }
    }
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_error_display_build() {
        let err = EmailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }

    #[test]
    fn email_error_display_address() {
        let addr_err: Result<lettre::Address, _> = "not-an-email".parse();
        let err = EmailError::Address(addr_err.unwrap_err());
        assert!(err.to_string().contains("Email address parse error"));
    }

    #[test]
    fn compose_uses_title_and_flat_payload_fields() {
        let event = PlatformEvent::new(event_types::RENEWAL_DELISTED).with_payload(json!({
            "message": "Scholar 2021-0001 was delisted",
            "student_number": "2021-0001",
            "renewal_id": 12,
            "criteria": ["good_moral_validation"],
        }));
        let (subject, body) = compose(&event);

        assert_eq!(subject, "[Scholarships] Scholar delisted");
        assert!(body.contains("Scholar 2021-0001 was delisted"));
        assert!(body.contains("student_number: 2021-0001"));
        assert!(body.contains("renewal_id: 12"));
        assert!(!body.contains("criteria"));
    }
}
