//! The daily lesson workflow.
//!
//! One run walks a fixed sequence of stages:
//!
//! ```text
//! Fetching -> Generating -> NotifyingEmail -> NotifyingChat -> Persisting -> Done
//! ```
//!
//! Any failure moves the run to `Failed` and skips every later stage,
//! including the state write. The progress record therefore only changes
//! after generation and both deliveries have succeeded.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info, warn};

use crate::config::{Config, Secrets, CHAT_ID_VAR};
use crate::error::{Channel, LessonError, Result};
use crate::progress::{LessonOutcome, StoredState};
use crate::render::{chat_text, commit_message, email_subject};
use crate::services::Services;

// ============================================================================
// RunStage
// ============================================================================

/// Stage of a single workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStage {
    /// Reading the progress record.
    Fetching,
    /// Calling the generation API.
    Generating,
    /// Sending the lesson email.
    NotifyingEmail,
    /// Posting the chat message.
    NotifyingChat,
    /// Writing the updated progress record.
    Persisting,
    /// Every step succeeded.
    Done,
    /// A step failed; later steps were skipped.
    Failed,
}

impl RunStage {
    /// The stage that follows this one on success, if any.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Fetching => Some(Self::Generating),
            Self::Generating => Some(Self::NotifyingEmail),
            Self::NotifyingEmail => Some(Self::NotifyingChat),
            Self::NotifyingChat => Some(Self::Persisting),
            Self::Persisting => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// Returns `true` for `Done` and `Failed`.
    ///
    /// # Examples
    ///
    /// ```
    /// use lesson_orchestrator::RunStage;
    ///
    /// assert!(RunStage::Done.is_terminal());
    /// assert!(RunStage::Failed.is_terminal());
    /// assert!(!RunStage::Persisting.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns `true` if a failure in this stage leaves no delivered
    /// notification behind, so running again cannot send a duplicate.
    #[must_use]
    pub const fn is_retry_safe(&self) -> bool {
        matches!(
            self,
            Self::Fetching | Self::Generating | Self::NotifyingEmail
        )
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetching => write!(f, "fetching"),
            Self::Generating => write!(f, "generating"),
            Self::NotifyingEmail => write!(f, "notifying_email"),
            Self::NotifyingChat => write!(f, "notifying_chat"),
            Self::Persisting => write!(f, "persisting"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ============================================================================
// WorkflowRun
// ============================================================================

/// Progress of one run through the stages.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    stage: RunStage,
    failed_at: Option<RunStage>,
    started_at: DateTime<Utc>,
}

impl Default for WorkflowRun {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowRun {
    /// Creates a run in the `Fetching` stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage: RunStage::Fetching,
            failed_at: None,
            started_at: Utc::now(),
        }
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> RunStage {
        self.stage
    }

    /// Stage the run failed in, once it has failed.
    #[must_use]
    pub const fn failed_at(&self) -> Option<RunStage> {
        self.failed_at
    }

    /// Moves to `to`, which must be the successor of the current stage.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::InvalidStateTransition` for any other target.
    pub fn advance(&mut self, to: RunStage) -> Result<()> {
        if self.stage.next() != Some(to) {
            return Err(LessonError::invalid_transition(self.stage, to));
        }
        self.stage = to;
        Ok(())
    }

    /// Marks the run failed and returns the stage it failed in.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::InvalidStateTransition` if the run already ended.
    pub fn fail(&mut self) -> Result<RunStage> {
        if self.stage.is_terminal() {
            return Err(LessonError::invalid_transition(
                self.stage,
                RunStage::Failed,
            ));
        }
        let stage = self.stage;
        self.failed_at = Some(stage);
        self.stage = RunStage::Failed;
        Ok(stage)
    }

    /// Time since the run started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

// ============================================================================
// RunFailure
// ============================================================================

/// A failed run: the error and the stage it happened in.
///
/// Displays as the underlying error message, which is what the trigger
/// returns to the caller.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RunFailure {
    /// Stage the run was in when it failed.
    pub stage: RunStage,
    /// The error that ended the run.
    #[source]
    pub error: LessonError,
}

impl RunFailure {
    /// Logs the failure with its classification.
    pub fn log(&self) {
        error!(
            kind = %self.error.kind(),
            stage = %self.stage,
            retry_safe = self.stage.is_retry_safe(),
            suggestion = self.error.suggestion().unwrap_or(""),
            error = %self.error,
            "Lesson run failed"
        );
    }
}

// ============================================================================
// LessonWorkflow
// ============================================================================

/// Values the workflow needs that are not services.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Path of the progress file in the content store.
    pub state_path: String,
    /// Chat destination; the chat step fails when it is unset.
    pub chat_id: Option<String>,
}

impl WorkflowSettings {
    /// Derives settings from configuration and environment secrets.
    #[must_use]
    pub fn from_config(config: &Config, secrets: &Secrets) -> Self {
        Self {
            state_path: config.state_path.clone(),
            chat_id: secrets.chat_id.clone(),
        }
    }
}

/// Runs the fetch, generate, notify, persist sequence.
#[derive(Debug, Clone)]
pub struct LessonWorkflow {
    services: Services,
    settings: WorkflowSettings,
}

impl LessonWorkflow {
    /// Creates a workflow over the given services.
    #[must_use]
    pub const fn new(services: Services, settings: WorkflowSettings) -> Self {
        Self { services, settings }
    }

    /// Performs one run. `today` becomes `last_generated` on success.
    ///
    /// # Errors
    ///
    /// Returns a [`RunFailure`] naming the stage that failed. Deliveries made
    /// before the failure are not undone.
    pub async fn run(&self, today: NaiveDate) -> std::result::Result<LessonOutcome, RunFailure> {
        let mut run = WorkflowRun::new();
        match self.execute(&mut run, today).await {
            Ok(outcome) => {
                info!(
                    reference = %outcome.reference,
                    total_lessons = outcome.state.total_lessons,
                    elapsed_ms = run.elapsed().num_milliseconds(),
                    "Lesson run completed"
                );
                Ok(outcome)
            }
            Err(error) => {
                let stage = run.fail().unwrap_or_else(|_| run.stage());
                Err(RunFailure { stage, error })
            }
        }
    }

    async fn execute(&self, run: &mut WorkflowRun, today: NaiveDate) -> Result<LessonOutcome> {
        let path = self.settings.state_path.as_str();

        info!(path, "Fetching progress state");
        let StoredState {
            mut state,
            revision,
        } = self.services.store.fetch_state(path).await?;

        run.advance(RunStage::Generating)?;
        info!(
            completed = state.completed_passages.len(),
            "Generating lesson"
        );
        let lesson = self
            .services
            .generator
            .generate(&state.completed_passages)
            .await?;
        if state.has_completed(&lesson.reference) {
            warn!(reference = %lesson.reference, "Model repeated a completed passage");
        }

        run.advance(RunStage::NotifyingEmail)?;
        info!(reference = %lesson.reference, "Sending lesson email");
        self.services
            .email
            .send_email(
                &state.preferences.email,
                &email_subject(&lesson.reference),
                &lesson.lesson_html,
            )
            .await?;

        run.advance(RunStage::NotifyingChat)?;
        info!(reference = %lesson.reference, "Sending chat message");
        let chat_id = self.settings.chat_id.as_deref().ok_or_else(|| {
            LessonError::notification(Channel::Chat, format!("{CHAT_ID_VAR} is not set"))
        })?;
        self.services
            .chat
            .send_message(chat_id, &chat_text(&lesson))
            .await?;

        run.advance(RunStage::Persisting)?;
        state.record_lesson(lesson.reference.clone(), today);
        info!(
            reference = %lesson.reference,
            total_lessons = state.total_lessons,
            "Writing progress state"
        );
        let revision = self
            .services
            .store
            .write_state(path, &state, &commit_message(&lesson.reference), &revision)
            .await?;

        run.advance(RunStage::Done)?;
        Ok(LessonOutcome {
            reference: lesson.reference,
            state,
            revision,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
