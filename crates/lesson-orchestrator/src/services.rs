//! Contracts for the external services the workflow talks to.
//!
//! The workflow only sees these traits; concrete HTTP clients live in the
//! `lesson-services` crate and tests substitute in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::progress::{GeneratedLesson, ProgressState, StoredState};

/// Versioned storage for the progress record.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Reads and decodes the record at `path`.
    ///
    /// # Errors
    ///
    /// `LessonError::NotFound` if nothing is stored at `path`,
    /// `LessonError::Decode` if the stored content is not a progress record.
    async fn fetch_state(&self, path: &str) -> Result<StoredState>;

    /// Writes `state` to `path` only if the stored revision is still
    /// `revision`, and returns the new revision token.
    ///
    /// # Errors
    ///
    /// `LessonError::Conflict` if the stored revision has moved on.
    async fn write_state(
        &self,
        path: &str,
        state: &ProgressState,
        message: &str,
        revision: &str,
    ) -> Result<String>;
}

/// Produces one lesson that avoids the given references.
#[async_trait]
pub trait LessonGenerator: Send + Sync {
    /// Generates a lesson, excluding every reference in `completed`.
    ///
    /// # Errors
    ///
    /// `LessonError::Generation` if the call fails or the reply is unusable.
    async fn generate(&self, completed: &[String]) -> Result<GeneratedLesson>;
}

/// Transactional email delivery.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Sends one HTML email.
    ///
    /// # Errors
    ///
    /// `LessonError::Notification` if delivery fails.
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

/// Chat-bot message delivery.
#[async_trait]
pub trait ChatSender: Send + Sync {
    /// Posts a markdown message to `chat_id` with link previews disabled.
    ///
    /// # Errors
    ///
    /// `LessonError::Notification` if delivery fails.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()>;
}

/// The full set of collaborators one workflow run needs.
#[derive(Clone)]
pub struct Services {
    /// Progress record storage.
    pub store: Arc<dyn StateStore>,
    /// Lesson generation.
    pub generator: Arc<dyn LessonGenerator>,
    /// Email channel.
    pub email: Arc<dyn EmailSender>,
    /// Chat channel.
    pub chat: Arc<dyn ChatSender>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
