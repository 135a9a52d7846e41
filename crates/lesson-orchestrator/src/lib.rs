//! Daily Lesson Orchestrator
//!
//! Runs the daily lesson workflow: read the progress record, generate a new
//! passage, deliver it by email and chat, then record it. Exposes the
//! workflow over HTTP and defines the service contracts its clients implement.

pub mod api;
pub mod config;
pub mod error;
pub mod progress;
pub mod render;
pub mod services;
pub mod workflow;

pub use api::{create_router, AppState, ErrorResponse, LessonResponse};
pub use config::{
    Config, Endpoints, Secrets, CHAT_ID_VAR, CHAT_TOKEN_VAR, CONFIG_FILE_NAME, EMAIL_API_KEY_VAR,
    GENERATION_API_KEY_VAR, GITHUB_TOKEN_VAR,
};
pub use error::{Channel, ErrorKind, LessonError, Result};
pub use progress::{GeneratedLesson, LessonOutcome, Preferences, ProgressState, StoredState};
pub use services::{ChatSender, EmailSender, LessonGenerator, Services, StateStore};
pub use workflow::{LessonWorkflow, RunFailure, RunStage, WorkflowRun, WorkflowSettings};
