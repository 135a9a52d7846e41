//! Lesson generation through an OpenAI-compatible chat completions API.

use async_trait::async_trait;
use lesson_orchestrator::config::GENERATION_API_KEY_VAR;
use lesson_orchestrator::render::build_prompt;
use lesson_orchestrator::{Config, GeneratedLesson, LessonError, LessonGenerator, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{endpoint, error_message, redacted};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Generates lessons with a single user-turn completion in JSON mode.
#[derive(Clone)]
pub struct ChatCompletionsGenerator {
    client: Client,
    base_url: String,
    model: String,
    temperature: f64,
    api_key: Option<String>,
}

impl std::fmt::Debug for ChatCompletionsGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsGenerator")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("api_key", &redacted(self.api_key.as_ref()))
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsGenerator {
    /// Creates a generator using the model settings in `config`.
    #[must_use]
    pub fn new(client: Client, config: &Config, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: config.endpoints.generation.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        }
    }

    fn request_body(&self, prompt: String) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

#[async_trait]
impl LessonGenerator for ChatCompletionsGenerator {
    async fn generate(&self, completed: &[String]) -> Result<GeneratedLesson> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            LessonError::generation(format!("{GENERATION_API_KEY_VAR} is not set"))
        })?;

        let url = endpoint(&self.base_url, "chat/completions");
        let body = self.request_body(build_prompt(completed));
        debug!(model = %self.model, excluded = completed.len(), "Requesting lesson");

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LessonError::generation(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LessonError::generation(e.to_string()))?;
        if !status.is_success() {
            return Err(LessonError::generation(format!(
                "generation API returned {status}: {}",
                error_message(&text)
            )));
        }

        let content = first_choice_content(&text)?;
        GeneratedLesson::from_model_content(&content)
    }
}

/// Extracts the first choice's message content from a completion response.
fn first_choice_content(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| LessonError::generation(format!("unexpected response: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LessonError::generation("response contained no choices"))?
        .message
        .content
        .ok_or_else(|| LessonError::generation("response message has no content"))
}
