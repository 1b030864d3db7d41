//! Error types for QuizBuilder.
//!
//! Library crates use [`QuizBuilderError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Why a model reply could not be turned into the expected question shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatErrorReason {
    /// No JSON could be recovered from the reply.
    Unparseable,
    /// An array was expected but a lone object came back.
    ShapeMismatch,
    /// A single question was expected but the array held several.
    ExpectedSingleGotMany,
    /// A single question was expected but the array was empty.
    EmptyArray,
}

impl FormatErrorReason {
    /// Stable wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unparseable => "unparseable",
            Self::ShapeMismatch => "shape_mismatch",
            Self::ExpectedSingleGotMany => "expected_single_got_many",
            Self::EmptyArray => "empty_array",
        }
    }
}

impl std::fmt::Display for FormatErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for all QuizBuilder operations.
#[derive(Debug, thiserror::Error)]
pub enum QuizBuilderError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The model did not answer within the wall-clock budget.
    #[error("generation timed out after {after:?}")]
    GenerationTimeout { after: Duration },

    /// The chat endpoint answered with a non-success status.
    ///
    /// `body` is the raw response text, kept for diagnostics only.
    #[error("upstream error (HTTP {status}): {message}")]
    Upstream {
        status: u16,
        message: String,
        body: String,
    },

    /// Transport failure before any HTTP status was received.
    #[error("network error: {0}")]
    Network(String),

    /// A model reply could not be coerced into questions.
    #[error("format error: {reason}")]
    Format { reason: FormatErrorReason },

    /// A single-question payload failed field validation.
    #[error("invalid question: {}", .issues.join("; "))]
    InvalidQuestion { issues: Vec<String> },

    /// The requested action is not allowed in the current pipeline stage.
    #[error("cannot {action} during stage {stage}")]
    InvalidStage { action: String, stage: String },

    /// Database or storage layer error.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad index, invalid edit, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, QuizBuilderError>;

impl QuizBuilderError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a persistence error from any displayable message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a format error with the given reason.
    pub fn format(reason: FormatErrorReason) -> Self {
        Self::Format { reason }
    }

    /// Create a stage error for `action` attempted during `stage`.
    pub fn invalid_stage(action: impl Into<String>, stage: impl std::fmt::Display) -> Self {
        Self::InvalidStage {
            action: action.into(),
            stage: stage.to_string(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Raw upstream body, if this error carries one.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Self::Upstream { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Stable machine-readable identifier, used in formatting responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::GenerationTimeout { .. } => "generation_timeout",
            Self::Upstream { .. } => "upstream",
            Self::Network(_) => "network",
            Self::Format { reason } => reason.as_str(),
            Self::InvalidQuestion { .. } => "invalid_question",
            Self::InvalidStage { .. } => "invalid_stage",
            Self::Persistence(_) => "persistence",
            Self::Io { .. } => "io",
            Self::Validation { .. } => "validation",
        }
    }

    /// Whether the user can recover by re-issuing the same action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GenerationTimeout { .. }
                | Self::Upstream { .. }
                | Self::Network(_)
                | Self::Format { .. }
                | Self::Persistence(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = QuizBuilderError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = QuizBuilderError::format(FormatErrorReason::ExpectedSingleGotMany);
        assert_eq!(err.to_string(), "format error: expected_single_got_many");
    }

    #[test]
    fn timeout_display() {
        let err = QuizBuilderError::GenerationTimeout {
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "generation timed out after 30s");
    }

    #[test]
    fn upstream_display_hides_raw_body() {
        let err = QuizBuilderError::Upstream {
            status: 429,
            message: "rate limited".into(),
            body: r#"{"error":{"message":"rate limited","internal":"secret-trace"}}"#.into(),
        };
        let shown = err.to_string();
        assert!(shown.contains("429"));
        assert!(!shown.contains("secret-trace"));
        assert!(err.raw_body().unwrap().contains("secret-trace"));
    }

    #[test]
    fn retryable_classification() {
        assert!(
            QuizBuilderError::GenerationTimeout {
                after: Duration::from_secs(30)
            }
            .is_retryable()
        );
        assert!(QuizBuilderError::format(FormatErrorReason::Unparseable).is_retryable());
        assert!(QuizBuilderError::persistence("db locked").is_retryable());
        assert!(!QuizBuilderError::invalid_stage("submit", "create_master").is_retryable());
        assert!(!QuizBuilderError::config("bad").is_retryable());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            QuizBuilderError::format(FormatErrorReason::ShapeMismatch).code(),
            "shape_mismatch"
        );
        assert_eq!(
            QuizBuilderError::Network("refused".into()).code(),
            "network"
        );
    }

    #[test]
    fn invalid_question_lists_issues() {
        let err = QuizBuilderError::InvalidQuestion {
            issues: vec!["missing explanation".into(), "option C is empty".into()],
        };
        assert_eq!(
            err.to_string(),
            "invalid question: missing explanation; option C is empty"
        );
    }
}
