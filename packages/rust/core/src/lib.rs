//! Quiz authoring pipeline for QuizBuilder.
//!
//! This crate ties the chat backend, JSON extraction and persistence together
//! into the three-stage authoring flow: create a master question, generate
//! its variations, then review and submit.

pub mod formatter;
pub mod generator;
pub mod pipeline;
pub mod prompts;
pub mod quiz;
pub mod store;

pub use formatter::{FormatRequest, FormatResponse, StructuredFormatter, interpret};
pub use generator::QuestionGenerator;
pub use pipeline::{
    AuthoringContext, AuthoringPipeline, MasterOutcome, NotificationStatus, PipelineSession,
    Regenerated, Submission, SubmissionReceipt, VariationsOutcome,
};
pub use quiz::{AnswerOutcome, QuizRun};
pub use store::{NewQuiz, Notifier, NotifyOutcome, QuestionStore};
