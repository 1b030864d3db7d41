//! Conversational question generation.

use tracing::{debug, instrument};

use quizbuilder_llm::{ChatBackend, ChatRequest, complete_within};
use quizbuilder_shared::{ChatMessage, ModelCallConfig, Result};

/// Issues stage prompts to the chat backend with the session's prior turns.
///
/// Returns raw assistant prose; structure is the formatter's job.
pub struct QuestionGenerator<'a, B> {
    backend: &'a B,
    model: &'a str,
    call: &'a ModelCallConfig,
}

impl<'a, B: ChatBackend> QuestionGenerator<'a, B> {
    pub fn new(backend: &'a B, model: &'a str, call: &'a ModelCallConfig) -> Self {
        Self {
            backend,
            model,
            call,
        }
    }

    /// System context, then the whole history, then the new user message.
    pub fn build_messages(
        user_message: &str,
        history: &[ChatMessage],
        system_context: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_context));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(user_message));
        messages
    }

    /// Send one generation request, bounded by the configured timeout.
    #[instrument(skip_all, fields(history = history.len()))]
    pub async fn generate(
        &self,
        user_message: &str,
        history: &[ChatMessage],
        system_context: &str,
    ) -> Result<String> {
        let request = ChatRequest {
            model: self.model.to_string(),
            messages: Self::build_messages(user_message, history, system_context),
            temperature: self.call.temperature,
            max_tokens: self.call.max_tokens,
        };

        let reply = complete_within(self.backend, &request, self.call.timeout()).await?;
        debug!(chars = reply.chars().count(), "generation reply received");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizbuilder_shared::{QuizBuilderError, Role};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records the last request and answers with a fixed reply.
    struct Recording {
        reply: String,
        seen: Mutex<Option<ChatRequest>>,
    }

    impl ChatBackend for Recording {
        async fn complete(&self, request: &ChatRequest) -> Result<String> {
            *self.seen.lock().unwrap() = Some(request.clone());
            Ok(self.reply.clone())
        }
    }

    struct Hanging;

    impl ChatBackend for Hanging {
        async fn complete(&self, _request: &ChatRequest) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        }
    }

    #[test]
    fn message_order() {
        let history = vec![ChatMessage::user("avant"), ChatMessage::assistant("réponse")];
        let messages = QuestionGenerator::<Recording>::build_messages("maintenant", &history, "ctx");
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages[0].content, "ctx");
        assert_eq!(messages[3].content, "maintenant");
    }

    #[tokio::test]
    async fn uses_generation_parameters() {
        let backend = Recording {
            reply: "Voici un QCM".into(),
            seen: Mutex::new(None),
        };
        let call = ModelCallConfig::generation();
        let generator = QuestionGenerator::new(&backend, "model-x", &call);

        let reply = generator.generate("Une question", &[], "ctx").await.unwrap();
        assert_eq!(reply, "Voici un QCM");

        let seen = backend.seen.lock().unwrap().clone().expect("request");
        assert_eq!(seen.model, "model-x");
        assert!((seen.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(seen.max_tokens, 2000);
        assert_eq!(seen.messages.len(), 2);
    }

    #[tokio::test]
    async fn timeout_is_distinct_error() {
        let call = ModelCallConfig {
            temperature: 0.7,
            max_tokens: 100,
            timeout_secs: 0,
        };
        let generator = QuestionGenerator::new(&Hanging, "m", &call);
        let err = generator.generate("q", &[], "ctx").await.unwrap_err();
        assert!(matches!(err, QuizBuilderError::GenerationTimeout { .. }));
    }
}
