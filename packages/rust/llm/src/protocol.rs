//! Chat-completion wire types (OpenAI-compatible subset).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use quizbuilder_shared::ChatMessage;

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Content of the first choice, if the endpoint produced any text.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

/// Longest upstream message shown to a user.
const MAX_MESSAGE_CHARS: usize = 200;

/// Derive a short, user-safe message from a non-success response body.
///
/// The body is read as text first; only if it happens to be JSON are the
/// usual `error.message` / `error` / `message` fields consulted. Otherwise
/// the canonical reason phrase for `status` is used.
pub fn upstream_message(status: u16, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        let candidates = [
            v.pointer("/error/message"),
            v.get("error"),
            v.get("message"),
        ];
        candidates
            .into_iter()
            .flatten()
            .find_map(Value::as_str)
            .map(str::to_owned)
    });

    let message = from_json
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| canonical_reason(status).to_string());

    truncate_chars(message.trim(), MAX_MESSAGE_CHARS)
}

fn canonical_reason(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unexpected status")
}

/// Cut `text` to at most `max` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_roles_lowercase() {
        let req = ChatRequest {
            model: "m".into(),
            messages: vec![ChatMessage::system("ctx"), ChatMessage::user("salut")],
            temperature: 0.7,
            max_tokens: 2000,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "salut");
        assert_eq!(json["max_tokens"], 2000);
    }

    #[test]
    fn response_without_content() {
        let resp: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(resp.first_content(), None);

        let resp: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.choices.is_empty());
    }

    #[test]
    fn message_from_nested_error() {
        let body = r#"{"error":{"message":"Rate limit exceeded","code":429}}"#;
        assert_eq!(upstream_message(429, body), "Rate limit exceeded");
    }

    #[test]
    fn message_from_flat_fields() {
        assert_eq!(upstream_message(400, r#"{"error":"bad model"}"#), "bad model");
        assert_eq!(upstream_message(400, r#"{"message":"nope"}"#), "nope");
    }

    #[test]
    fn message_falls_back_to_reason() {
        assert_eq!(upstream_message(502, "<html>Bad Gateway</html>"), "Bad Gateway");
        assert_eq!(upstream_message(500, r#"{"error":{"code":1}}"#), "Internal Server Error");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("élève", 3), "élè");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
