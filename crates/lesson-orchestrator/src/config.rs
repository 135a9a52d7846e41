//! Configuration types for the daily lesson job.
//!
//! Non-secret settings (which repository holds the progress file, which
//! model to call, service base URLs) live in an optional `lesson.json`.
//! Credentials never go in that file; they are read from the environment
//! into [`Secrets`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LessonError, Result};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "lesson.json";

/// Environment variable holding the content store token.
pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";
/// Environment variable holding the generation API key.
pub const GENERATION_API_KEY_VAR: &str = "GROK_API_KEY";
/// Environment variable holding the email service key.
pub const EMAIL_API_KEY_VAR: &str = "RESEND_API_KEY";
/// Environment variable holding the chat bot token.
pub const CHAT_TOKEN_VAR: &str = "TELEGRAM_TOKEN";
/// Environment variable holding the chat destination identifier.
pub const CHAT_ID_VAR: &str = "TELEGRAM_CHAT_ID";

fn default_repo_owner() -> String {
    "hamish-rose".to_string()
}

fn default_repo_name() -> String {
    "ai-bible-lessons".to_string()
}

fn default_state_path() -> String {
    "progress.json".to_string()
}

fn default_model() -> String {
    "grok-3".to_string()
}

const fn default_temperature() -> f64 {
    0.8
}

fn default_email_from() -> String {
    "Bible Lessons <no-reply@yourdomain.com>".to_string()
}

/// Default per-request timeout for outbound HTTP calls.
const fn default_request_timeout_secs() -> u64 {
    60
}

fn default_github_endpoint() -> String {
    "https://api.github.com".to_string()
}

fn default_generation_endpoint() -> String {
    "https://api.x.ai/v1".to_string()
}

fn default_email_endpoint() -> String {
    "https://api.resend.com".to_string()
}

fn default_chat_endpoint() -> String {
    "https://api.telegram.org".to_string()
}

/// Main configuration for the lesson job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Owner of the repository holding the progress file.
    #[serde(default = "default_repo_owner")]
    pub repo_owner: String,

    /// Name of the repository holding the progress file.
    #[serde(default = "default_repo_name")]
    pub repo_name: String,

    /// Path of the progress file inside the repository.
    #[serde(default = "default_state_path")]
    pub state_path: String,

    /// Branch to read and commit to. The repository default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Model identifier sent to the generation API.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature sent to the generation API.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Sender shown on lesson emails.
    #[serde(default = "default_email_from")]
    pub email_from: String,

    /// Timeout applied to every outbound HTTP request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Base URLs of the external services.
    #[serde(default)]
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_owner: default_repo_owner(),
            repo_name: default_repo_name(),
            state_path: default_state_path(),
            branch: None,
            model: default_model(),
            temperature: default_temperature(),
            email_from: default_email_from(),
            request_timeout_secs: default_request_timeout_secs(),
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `lesson.json` in the current directory and falls back to
    /// defaults when it is absent.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            LessonError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `lesson.json` in a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::ConfigParseError` if the file exists but cannot be
    /// read or parsed, and `LessonError::ConfigValidationError` if the parsed
    /// values are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(LessonError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| LessonError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// - repository owner, name and state path must not be empty
    /// - `model` and `emailFrom` must not be empty
    /// - `temperature` must lie within `0.0..=2.0`
    /// - `requestTimeoutSecs` must be greater than 0
    /// - every endpoint must be an `http(s)` URL
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("repoOwner", &self.repo_owner),
            ("repoName", &self.repo_name),
            ("statePath", &self.state_path),
            ("model", &self.model),
            ("emailFrom", &self.email_from),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(LessonError::config_validation(
                    format!("{field} must not be empty"),
                    format!("Provide a value for {field} in your lesson.json or remove it to use the default"),
                ));
            }
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(LessonError::config_validation(
                format!("temperature must be between 0 and 2 (got {})", self.temperature),
                "Set temperature to a value such as 0.8 in your lesson.json",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(LessonError::config_validation(
                "requestTimeoutSecs must be greater than 0",
                "Set requestTimeoutSecs to at least 1 second in your lesson.json",
            ));
        }

        self.endpoints.validate()
    }
}

/// Base URLs of the external services.
///
/// Overridable so the job can be pointed at proxies or local fakes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    /// Content store (GitHub REST API) base URL.
    #[serde(default = "default_github_endpoint")]
    pub github: String,

    /// Generation API base URL; `/chat/completions` is appended.
    #[serde(default = "default_generation_endpoint")]
    pub generation: String,

    /// Email API base URL; `/emails` is appended.
    #[serde(default = "default_email_endpoint")]
    pub email: String,

    /// Chat bot API base URL; `/bot<token>/sendMessage` is appended.
    #[serde(default = "default_chat_endpoint")]
    pub chat: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            github: default_github_endpoint(),
            generation: default_generation_endpoint(),
            email: default_email_endpoint(),
            chat: default_chat_endpoint(),
        }
    }
}

impl Endpoints {
    fn validate(&self) -> Result<()> {
        let endpoints = [
            ("endpoints.github", &self.github),
            ("endpoints.generation", &self.generation),
            ("endpoints.email", &self.email),
            ("endpoints.chat", &self.chat),
        ];
        for (field, url) in endpoints {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(LessonError::config_validation(
                    format!("{field} must be an http(s) URL (got '{url}')"),
                    format!("Fix {field} in your lesson.json or remove it to use the default"),
                ));
            }
        }
        Ok(())
    }
}

/// Credentials and identifiers provided by the environment.
///
/// Every field is optional: a missing credential is reported by the step
/// that needs it, as a failure of that service call.
#[derive(Clone, Default)]
pub struct Secrets {
    /// Content store token.
    pub github_token: Option<String>,
    /// Generation API key.
    pub generation_api_key: Option<String>,
    /// Email service key.
    pub email_api_key: Option<String>,
    /// Chat bot token.
    pub chat_token: Option<String>,
    /// Chat destination identifier.
    pub chat_id: Option<String>,
}

impl Secrets {
    /// Reads all secrets from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads all secrets through `lookup`. Blank values count as absent.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            github_token: read(GITHUB_TOKEN_VAR),
            generation_api_key: read(GENERATION_API_KEY_VAR),
            email_api_key: read(EMAIL_API_KEY_VAR),
            chat_token: read(CHAT_TOKEN_VAR),
            chat_id: read(CHAT_ID_VAR),
        }
    }

    /// Names of the environment variables that are not set.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (GITHUB_TOKEN_VAR, self.github_token.is_none()),
            (GENERATION_API_KEY_VAR, self.generation_api_key.is_none()),
            (EMAIL_API_KEY_VAR, self.email_api_key.is_none()),
            (CHAT_TOKEN_VAR, self.chat_token.is_none()),
            (CHAT_ID_VAR, self.chat_id.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Secrets")
            .field("github_token", &redact(&self.github_token))
            .field("generation_api_key", &redact(&self.generation_api_key))
            .field("email_api_key", &redact(&self.email_api_key))
            .field("chat_token", &redact(&self.chat_token))
            .field("chat_id", &self.chat_id)
            .finish()
    }
}
