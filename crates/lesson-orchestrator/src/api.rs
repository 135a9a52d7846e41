//! HTTP trigger for the lesson workflow.
//!
//! # Endpoints
//!
//! - `GET /api/generate-lesson` - Run the workflow once (scheduler tick)
//! - `POST /api/generate-lesson` - Same, for manual triggers; any body is ignored
//!
//! Success returns `200 {"success": true, "reference": "..."}`; every failure
//! returns `500 {"error": "..."}` with the underlying message.
//!
//! # Example
//!
//! ```no_run
//! use lesson_orchestrator::{create_router, AppState, LessonWorkflow};
//!
//! # async fn example(workflow: LessonWorkflow) {
//! let router = create_router(AppState::new(workflow));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::progress::LessonOutcome;
use crate::workflow::{LessonWorkflow, RunFailure};

// ============================================================================
// Response Types
// ============================================================================

/// Body returned when a lesson was generated and delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonResponse {
    /// Always `true`.
    pub success: bool,
    /// Reference of the delivered lesson.
    pub reference: String,
}

impl From<&LessonOutcome> for LessonResponse {
    fn from(outcome: &LessonOutcome) -> Self {
        Self {
            success: true,
            reference: outcome.reference.clone(),
        }
    }
}

/// Error response body returned on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

impl From<&RunFailure> for ErrorResponse {
    fn from(failure: &RunFailure) -> Self {
        Self {
            error: failure.to_string(),
        }
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The workflow every trigger runs.
    pub workflow: LessonWorkflow,
}

impl AppState {
    /// Creates a new `AppState` around a workflow.
    #[must_use]
    pub const fn new(workflow: LessonWorkflow) -> Self {
        Self { workflow }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// The workflow run failed.
    Workflow(RunFailure),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Workflow(failure) => {
                failure.log();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::from(&failure),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with the trigger endpoint and request tracing.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new().route(
        "/generate-lesson",
        get(handle_generate_lesson).post(handle_generate_lesson),
    );

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET|POST /api/generate-lesson`.
async fn handle_generate_lesson(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LessonResponse>, ApiError> {
    let today = Utc::now().date_naive();
    info!(%today, "Lesson run triggered");

    let outcome = state.workflow.run(today).await.map_err(ApiError::Workflow)?;

    Ok(Json(LessonResponse::from(&outcome)))
}

// ============================================================================
// Tests
// ============================================================================
