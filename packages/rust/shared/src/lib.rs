//! Shared types, error model, and configuration for QuizBuilder.
//!
//! This crate is the foundation depended on by all other QuizBuilder crates.
//! It provides:
//! - [`QuizBuilderError`], the unified error type
//! - Domain types ([`Question`], [`Label`], [`QuestionSet`], [`ChatMessage`], [`Stage`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, FormattingConfig, LlmConfig, ModelCallConfig, api_key, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{FormatErrorReason, QuizBuilderError, Result};
pub use types::{
    ChatMessage, Label, Question, QuestionKind, QuestionSet, Role, SessionId, Shape, Stage,
    ValidationIssue,
};
