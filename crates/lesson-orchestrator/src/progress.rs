//! Progress record and lesson types.
//!
//! [`ProgressState`] is the one persistent document: it lives as a JSON file
//! in the content store and is read, mutated and conditionally written back
//! on every successful run. [`GeneratedLesson`] is the per-run model output.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LessonError, Result};

// ============================================================================
// ProgressState
// ============================================================================

/// Recipient preferences stored alongside the progress record.
///
/// Read-only for the workflow; only `email` is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Address lessons are emailed to.
    pub email: String,

    /// Preferred lesson length, e.g. `"1-5"`.
    #[serde(default)]
    pub verses_per_lesson: String,

    /// Themes the reader is interested in.
    #[serde(default)]
    pub focus_themes: Vec<String>,

    /// Any other keys in the file, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Which passages have been covered so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Label of the active lesson plan.
    pub plan: String,

    /// References already generated, oldest first. Append-only.
    pub completed_passages: Vec<String>,

    /// Always equal to `completed_passages.len()` after a write.
    #[serde(default)]
    pub total_lessons: usize,

    /// Date of the most recent successful run.
    #[serde(default)]
    pub last_generated: Option<NaiveDate>,

    /// Recipient preferences.
    pub preferences: Preferences,

    /// Any other keys in the file, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProgressState {
    /// Parses a progress record from raw file bytes.
    ///
    /// `path` is only used to label the error.
    pub fn from_json_bytes(path: &str, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| LessonError::decode(path, e.to_string()))
    }

    /// Serializes the record the way it is stored: pretty-printed with
    /// two-space indentation.
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns `true` if `reference` is already in `completed_passages`.
    ///
    /// Comparison ignores case and surrounding whitespace.
    #[must_use]
    pub fn has_completed(&self, reference: &str) -> bool {
        let needle = reference.trim();
        self.completed_passages
            .iter()
            .any(|done| done.trim().eq_ignore_ascii_case(needle))
    }

    /// Folds a newly delivered lesson into the record.
    ///
    /// Appends the reference, recomputes `total_lessons` and stamps
    /// `last_generated` with `date`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use lesson_orchestrator::{Preferences, ProgressState};
    ///
    /// let mut state = ProgressState {
    ///     plan: "Whole Bible".to_string(),
    ///     completed_passages: vec!["John 3:16-18".to_string()],
    ///     total_lessons: 1,
    ///     last_generated: None,
    ///     preferences: Preferences {
    ///         email: "reader@example.com".to_string(),
    ///         verses_per_lesson: "1-5".to_string(),
    ///         focus_themes: vec![],
    ///         extra: Default::default(),
    ///     },
    ///     extra: Default::default(),
    /// };
    ///
    /// let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    /// state.record_lesson("Psalm 23:1-3", today);
    ///
    /// assert_eq!(state.completed_passages, ["John 3:16-18", "Psalm 23:1-3"]);
    /// assert_eq!(state.total_lessons, 2);
    /// assert_eq!(state.last_generated, Some(today));
    /// ```
    pub fn record_lesson(&mut self, reference: impl Into<String>, date: NaiveDate) {
        self.completed_passages.push(reference.into());
        self.total_lessons = self.completed_passages.len();
        self.last_generated = Some(date);
    }
}

/// A progress record together with the revision token it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredState {
    /// The decoded record.
    pub state: ProgressState,
    /// Opaque token identifying the stored version.
    pub revision: String,
}

// ============================================================================
// GeneratedLesson
// ============================================================================

/// One lesson produced by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedLesson {
    /// Scripture reference, e.g. `"Psalm 23:1-3"`.
    pub reference: String,
    /// Lesson body as an HTML fragment.
    pub lesson_html: String,
}

/// Shape of the model reply before required fields are checked.
#[derive(Debug, Deserialize)]
struct RawLesson {
    reference: Option<String>,
    lesson_html: Option<String>,
}

impl GeneratedLesson {
    /// Parses the model's message content into a lesson.
    ///
    /// The content must be a JSON object whose `reference` and `lesson_html`
    /// fields are non-blank strings; anything else is a generation error.
    /// Values are kept exactly as the model returned them.
    pub fn from_model_content(content: &str) -> Result<Self> {
        let raw: RawLesson = serde_json::from_str(content.trim()).map_err(|e| {
            LessonError::generation(format!("model reply is not a lesson object: {e}"))
        })?;

        let reference = required_field(raw.reference, "reference")?;
        let lesson_html = required_field(raw.lesson_html, "lesson_html")?;

        Ok(Self {
            reference,
            lesson_html,
        })
    }
}

fn required_field(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(LessonError::generation(format!(
            "model reply has an empty '{name}'"
        ))),
        None => Err(LessonError::generation(format!(
            "model reply is missing '{name}'"
        ))),
    }
}

// ============================================================================
// LessonOutcome
// ============================================================================

/// Result of a fully successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonOutcome {
    /// Reference of the lesson that was delivered.
    pub reference: String,
    /// The record as written back.
    pub state: ProgressState,
    /// Revision token of the written record.
    pub revision: String,
}

// ============================================================================
// Tests
// ============================================================================
