//! HTTP clients for the services the lesson workflow depends on.
//!
//! Each client implements one of the contracts from
//! [`lesson_orchestrator::services`]:
//!
//! - [`GitHubContentStore`] - progress file in a GitHub repository
//! - [`ChatCompletionsGenerator`] - OpenAI-compatible chat completions (Grok)
//! - [`ResendEmailSender`] - Resend transactional email
//! - [`TelegramChatSender`] - Telegram Bot API
//!
//! [`build_services`] wires all four from configuration and secrets.

use std::sync::Arc;
use std::time::Duration;

use lesson_orchestrator::{Config, LessonError, Result, Secrets, Services};
use reqwest::Client;

pub mod chat;
pub mod content_store;
pub mod email;
pub mod generation;

pub use chat::TelegramChatSender;
pub use content_store::GitHubContentStore;
pub use email::ResendEmailSender;
pub use generation::ChatCompletionsGenerator;

/// User agent sent on every request. GitHub rejects requests without one.
pub const USER_AGENT: &str = concat!("daily-lesson/", env!("CARGO_PKG_VERSION"));

/// Builds the shared HTTP client with the configured request timeout.
///
/// # Errors
///
/// Returns `LessonError::ConfigValidationError` if the client cannot be built.
pub fn http_client(config: &Config) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| {
            LessonError::config_validation(
                format!("cannot build HTTP client: {e}"),
                "Check requestTimeoutSecs in your lesson.json",
            )
        })
}

/// Creates the production service set.
///
/// Missing secrets do not fail here; the client that needs one reports it
/// when the workflow reaches that step.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_services(config: &Config, secrets: &Secrets) -> Result<Services> {
    let client = http_client(config)?;

    Ok(Services {
        store: Arc::new(GitHubContentStore::new(
            client.clone(),
            config,
            secrets.github_token.clone(),
        )),
        generator: Arc::new(ChatCompletionsGenerator::new(
            client.clone(),
            config,
            secrets.generation_api_key.clone(),
        )),
        email: Arc::new(ResendEmailSender::new(
            client.clone(),
            config,
            secrets.email_api_key.clone(),
        )),
        chat: Arc::new(TelegramChatSender::new(
            client,
            config,
            secrets.chat_token.clone(),
        )),
    })
}

/// Joins a base URL and a path without doubling the slash.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Debug stand-in for a credential.
pub(crate) fn redacted(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "<redacted>")
}

/// Pulls a human-readable message out of an error response body.
///
/// Looks for the `message` (GitHub, Resend) or `description` (Telegram)
/// field and falls back to the raw body.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "description"]
                .into_iter()
                .find_map(|key| value.get(key)?.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}
