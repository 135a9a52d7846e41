//! Progress file storage backed by the GitHub contents API.
//!
//! The file's blob `sha` is the revision token: it comes back from every
//! read and must accompany every write, so GitHub rejects a write when the
//! file changed in between.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lesson_orchestrator::config::GITHUB_TOKEN_VAR;
use lesson_orchestrator::{Config, LessonError, ProgressState, Result, StateStore, StoredState};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{endpoint, error_message, redacted};

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ContentsFile {
    content: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    content: WrittenContent,
}

#[derive(Debug, Deserialize)]
struct WrittenContent {
    sha: String,
}

// ============================================================================
// GitHubContentStore
// ============================================================================

/// Reads and writes the progress file in one repository.
#[derive(Clone)]
pub struct GitHubContentStore {
    client: Client,
    base_url: String,
    owner: String,
    repo: String,
    branch: Option<String>,
    token: Option<String>,
}

impl std::fmt::Debug for GitHubContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubContentStore")
            .field("base_url", &self.base_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("token", &redacted(self.token.as_ref()))
            .finish_non_exhaustive()
    }
}

impl GitHubContentStore {
    /// Creates a store for the repository named in `config`.
    #[must_use]
    pub fn new(client: Client, config: &Config, token: Option<String>) -> Self {
        Self {
            client,
            base_url: config.endpoints.github.clone(),
            owner: config.repo_owner.clone(),
            repo: config.repo_name.clone(),
            branch: config.branch.clone(),
            token,
        }
    }

    fn contents_url(&self, path: &str) -> String {
        endpoint(
            &self.base_url,
            &format!("repos/{}/{}/contents/{}", self.owner, self.repo, path),
        )
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| LessonError::state_store(format!("{GITHUB_TOKEN_VAR} is not set")))?;

        Ok(self
            .client
            .request(method, self.contents_url(path))
            .bearer_auth(token)
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION))
    }
}

#[async_trait]
impl StateStore for GitHubContentStore {
    async fn fetch_state(&self, path: &str) -> Result<StoredState> {
        let mut request = self.request(Method::GET, path)?;
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LessonError::state_store(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LessonError::state_store(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_read_failure(path, status, &body));
        }

        let file: ContentsFile = serde_json::from_str(&body)
            .map_err(|e| LessonError::decode(path, format!("not a file response: {e}")))?;
        let bytes = decode_content(path, &file.content)?;
        let state = ProgressState::from_json_bytes(path, &bytes)?;

        debug!(path, sha = %file.sha, "Fetched progress state");
        Ok(StoredState {
            state,
            revision: file.sha,
        })
    }

    async fn write_state(
        &self,
        path: &str,
        state: &ProgressState,
        message: &str,
        revision: &str,
    ) -> Result<String> {
        let body = WriteRequest {
            message,
            content: encode_content(&state.to_pretty_json()?),
            sha: revision,
            branch: self.branch.as_deref(),
        };

        let response = self
            .request(Method::PUT, path)?
            .json(&body)
            .send()
            .await
            .map_err(|e| LessonError::state_store(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LessonError::state_store(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_write_failure(path, status, &text));
        }

        let written: WriteResponse = serde_json::from_str(&text).map_err(|e| {
            LessonError::state_store(format!("unexpected write response: {e}"))
        })?;
        debug!(path, sha = %written.content.sha, "Wrote progress state");
        Ok(written.content.sha)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Decodes the base64 `content` field. GitHub wraps it at 60 columns.
fn decode_content(path: &str, content: &str) -> Result<Vec<u8>> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| LessonError::decode(path, format!("invalid base64 content: {e}")))
}

fn encode_content(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

fn classify_read_failure(path: &str, status: StatusCode, body: &str) -> LessonError {
    if status == StatusCode::NOT_FOUND {
        return LessonError::not_found(path);
    }
    LessonError::state_store(format!(
        "GitHub returned {status}: {}",
        error_message(body)
    ))
}

/// Maps a failed write to an error. A stale `sha` surfaces as 409, or as
/// 422 with a message naming the sha.
fn classify_write_failure(path: &str, status: StatusCode, body: &str) -> LessonError {
    let message = error_message(body);
    let stale = status == StatusCode::CONFLICT
        || (status == StatusCode::UNPROCESSABLE_ENTITY && message.to_lowercase().contains("sha"));

    if stale {
        LessonError::conflict(path, message)
    } else {
        LessonError::state_store(format!("GitHub returned {status}: {message}"))
    }
}
