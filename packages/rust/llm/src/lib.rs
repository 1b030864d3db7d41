//! Chat-completion access for QuizBuilder.
//!
//! [`ChatBackend`] is the seam the generator and formatter talk to.
//! [`ChatClient`] implements it over HTTP; tests substitute scripted fakes.
//! The wall-clock budget for a call is applied by [`complete_within`], above
//! any backend, so every implementation times out the same way.

pub mod client;
pub mod protocol;

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use quizbuilder_shared::{QuizBuilderError, Result};

pub use client::ChatClient;
pub use protocol::{ChatRequest, ChatResponse, Choice, ChoiceMessage, truncate_chars};

/// Anything that can turn a chat request into assistant text.
pub trait ChatBackend: Send + Sync {
    /// Send one request and return the first choice's content.
    fn complete(&self, request: &ChatRequest) -> impl Future<Output = Result<String>> + Send;
}

/// Run `backend.complete` with a hard deadline.
///
/// The in-flight request is dropped (cancelled) when the deadline passes.
pub async fn complete_within<B: ChatBackend>(
    backend: &B,
    request: &ChatRequest,
    deadline: Duration,
) -> Result<String> {
    match tokio::time::timeout(deadline, backend.complete(request)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?deadline, model = %request.model, "chat completion timed out");
            Err(QuizBuilderError::GenerationTimeout { after: deadline })
        }
    }
}
