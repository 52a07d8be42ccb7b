//! Outbound mail delivery.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use natours_auth::{MailError, MailMessage, Mailer};

/// Writes messages to the log instead of delivering them. Used when no relay is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.text,
            "mail relay not configured; message logged instead of sent"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HttpMailerConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub from: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Delivers through an HTTP mail relay: one JSON POST per message.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    config: HttpMailerConfig,
}

impl HttpMailer {
    pub fn new(config: HttpMailerConfig) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        let body = RelayRequest {
            from: &self.config.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
        };

        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status.as_u16()));
        }

        tracing::debug!(to = %message.to, "mail handed to relay");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let message = MailMessage {
            to: "user@example.com".into(),
            subject: "hello".into(),
            text: "body".into(),
        };
        assert_eq!(LogMailer.send(message).await, Ok(()));
    }

    #[tokio::test]
    async fn unreachable_relay_is_a_transport_error() {
        let mailer = HttpMailer::new(HttpMailerConfig {
            endpoint: "http://127.0.0.1:9/send".into(),
            token: None,
            from: "Natours <hello@natours.io>".into(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let err = mailer
            .send(MailMessage {
                to: "user@example.com".into(),
                subject: "hello".into(),
                text: "body".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Transport(_)));
    }
}
