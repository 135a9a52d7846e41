//! Lesson email through the Resend API.

use async_trait::async_trait;
use lesson_orchestrator::config::EMAIL_API_KEY_VAR;
use lesson_orchestrator::{Channel, Config, EmailSender, LessonError, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::{endpoint, error_message, redacted};

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Sends HTML email from the configured sender address.
#[derive(Clone)]
pub struct ResendEmailSender {
    client: Client,
    base_url: String,
    from: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for ResendEmailSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendEmailSender")
            .field("base_url", &self.base_url)
            .field("from", &self.from)
            .field("api_key", &redacted(self.api_key.as_ref()))
            .finish_non_exhaustive()
    }
}

impl ResendEmailSender {
    /// Creates a sender using the `from` address in `config`.
    #[must_use]
    pub fn new(client: Client, config: &Config, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: config.endpoints.email.clone(),
            from: config.email_from.clone(),
            api_key,
        }
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let fail = |message: String| LessonError::notification(Channel::Email, message);

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| fail(format!("{EMAIL_API_KEY_VAR} is not set")))?;

        let body = SendEmailRequest {
            from: &self.from,
            to: [to],
            subject,
            html,
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "emails"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(fail(format!(
                "email service returned {status}: {}",
                error_message(&text)
            )));
        }

        debug!(to, "Email accepted");
        Ok(())
    }
}
