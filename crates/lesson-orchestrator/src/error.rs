//! Error types for the daily lesson workflow.
//!
//! Every failure the workflow can hit maps to one variant of [`LessonError`].
//! The HTTP boundary collapses all of them into the same opaque 500 response,
//! but the variants stay distinct so the boundary can log what happened.

use std::path::PathBuf;

/// A specialized `Result` type for lesson workflow operations.
pub type Result<T> = std::result::Result<T, LessonError>;

/// Errors that can occur while producing and delivering a lesson.
#[derive(Debug, thiserror::Error)]
pub enum LessonError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your lesson.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // State Store Errors
    // ========================================================================
    /// The progress file does not exist in the content store.
    #[error("State file not found: '{path}'")]
    NotFound {
        /// Repository path of the missing file.
        path: String,
    },

    /// The progress file exists but is not a valid progress record.
    #[error("Malformed state file '{path}': {message}")]
    Decode {
        /// Repository path of the file.
        path: String,
        /// Description of the decoding failure.
        message: String,
    },

    /// The conditional write lost against a concurrent change.
    #[error("State file '{path}' changed since it was read: {message}")]
    Conflict {
        /// Repository path of the file.
        path: String,
        /// Message reported by the content store.
        message: String,
    },

    /// Any other content store failure (transport, auth, server).
    #[error("State store request failed: {message}")]
    StateStore {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Generation Errors
    // ========================================================================
    /// The model call failed or returned unusable content.
    #[error("Lesson generation failed: {message}")]
    Generation {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Notification Errors
    // ========================================================================
    /// Delivering the lesson over one of the channels failed.
    #[error("{channel} delivery failed: {message}")]
    Notification {
        /// The channel that failed.
        channel: Channel,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid workflow stage transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current stage.
        from: String,
        /// The attempted target stage.
        to: String,
    },

    // ========================================================================
    // General Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Delivery channels used by the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Transactional email.
    Email,
    /// Chat-bot message.
    Chat,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Chat => write!(f, "chat"),
        }
    }
}

/// Coarse classification of a [`LessonError`] for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration could not be loaded or is invalid.
    Config,
    /// State file missing.
    NotFound,
    /// State file malformed.
    Decode,
    /// Conditional write lost a race.
    Conflict,
    /// Other content store failure.
    StateStore,
    /// Model call failed or returned unusable content.
    Generation,
    /// Email or chat delivery failed.
    Notification,
    /// Programming or local I/O error.
    Internal,
}

impl ErrorKind {
    /// Returns the snake-case tag used in log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::NotFound => "not_found",
            Self::Decode => "decode",
            Self::Conflict => "conflict",
            Self::StateStore => "state_store",
            Self::Generation => "generation",
            Self::Notification => "notification",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LessonError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a new `Decode` error.
    #[must_use]
    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `StateStore` error.
    #[must_use]
    pub fn state_store(message: impl Into<String>) -> Self {
        Self::StateStore {
            message: message.into(),
        }
    }

    /// Creates a new `Generation` error.
    #[must_use]
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Creates a new `Notification` error for the given channel.
    #[must_use]
    pub fn notification(channel: Channel, message: impl Into<String>) -> Self {
        Self::Notification {
            channel,
            message: message.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigParseError { .. } | Self::ConfigValidationError { .. } => ErrorKind::Config,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::StateStore { .. } => ErrorKind::StateStore,
            Self::Generation { .. } => ErrorKind::Generation,
            Self::Notification { .. } => ErrorKind::Notification,
            Self::InvalidStateTransition { .. } | Self::Io(_) | Self::Json(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns a hint for the operator, if there is an obvious one.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => {
                Some("Create the progress file in the repository before the first run")
            }
            Self::Decode { .. } => Some("Fix the progress file so it matches the expected schema"),
            Self::Conflict { .. } => {
                Some("Another run updated the progress file; notifications were already sent")
            }
            Self::Generation { .. } => Some("Check GROK_API_KEY and the model's output"),
            Self::Notification {
                channel: Channel::Email,
                ..
            } => Some("Check RESEND_API_KEY and the recipient address"),
            Self::Notification {
                channel: Channel::Chat,
                ..
            } => Some("Check TELEGRAM_TOKEN and TELEGRAM_CHAT_ID"),
            _ => None,
        }
    }
}
