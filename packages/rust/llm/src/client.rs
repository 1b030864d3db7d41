//! reqwest-backed chat-completion client.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};
use url::Url;

use quizbuilder_shared::{AppConfig, QuizBuilderError, Result, api_key};

use crate::ChatBackend;
use crate::protocol::{ChatRequest, ChatResponse, upstream_message};

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!("QuizBuilder/", env!("CARGO_PKG_VERSION"));

/// Time allowed to establish a connection. The overall call budget is
/// enforced by [`crate::complete_within`].
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl ChatClient {
    pub fn new(endpoint: Url, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            endpoint,
            api_key: api_key.into(),
        })
    }

    /// Build a client from `[llm]` settings, reading the key from the environment.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.llm.endpoint).map_err(|e| {
            QuizBuilderError::config(format!("invalid llm.endpoint {:?}: {e}", config.llm.endpoint))
        })?;
        Self::new(endpoint, api_key(config)?)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| QuizBuilderError::Network(format!("failed to build HTTP client: {e}")))
}

impl ChatBackend for ChatClient {
    #[instrument(skip_all, fields(model = %request.model, messages = request.messages.len()))]
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| QuizBuilderError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        // Error bodies are not guaranteed to be JSON; always read text first.
        let body = response
            .text()
            .await
            .map_err(|e| QuizBuilderError::Network(format!("reading response body: {e}")))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), %body, "chat endpoint returned an error");
            return Err(QuizBuilderError::Upstream {
                status: status.as_u16(),
                message: upstream_message(status.as_u16(), &body),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            debug!(%body, "chat response is not valid JSON");
            QuizBuilderError::Upstream {
                status: status.as_u16(),
                message: format!("malformed chat response: {e}"),
                body: body.clone(),
            }
        })?;

        match parsed.first_content() {
            Some(content) => {
                debug!(chars = content.chars().count(), "chat completion received");
                Ok(content.to_string())
            }
            None => Err(QuizBuilderError::Upstream {
                status: status.as_u16(),
                message: "chat response contained no message content".into(),
                body,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complete_within;
    use quizbuilder_shared::ChatMessage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "test-model".into(),
            messages: vec![
                ChatMessage::system("Tu es un assistant."),
                ChatMessage::user("Une question sur les fractions"),
            ],
            temperature: 0.7,
            max_tokens: 2000,
        }
    }

    fn client_for(server: &MockServer) -> ChatClient {
        let endpoint = Url::parse(&format!("{}/v1/chat/completions", server.uri())).unwrap();
        ChatClient::new(endpoint, "sk-test").unwrap()
    }

    #[tokio::test]
    async fn successful_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "temperature": 0.7,
                "max_tokens": 2000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Voici un QCM"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server).complete(&request()).await.unwrap();
        assert_eq!(reply, "Voici un QCM");
    }

    #[tokio::test]
    async fn non_json_error_body_is_read_as_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too many requests, slow down"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete(&request()).await.unwrap_err();
        match &err {
            QuizBuilderError::Upstream { status, message, body } => {
                assert_eq!(*status, 429);
                assert_eq!(message, "Too Many Requests");
                assert_eq!(body, "Too many requests, slow down");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn json_error_body_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Invalid API key", "trace": "abc-123"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).complete(&request()).await.unwrap_err();
        let shown = err.to_string();
        assert!(shown.contains("401"));
        assert!(shown.contains("Invalid API key"));
        assert!(!shown.contains("abc-123"));
        assert!(err.raw_body().unwrap().contains("abc-123"));
    }

    #[tokio::test]
    async fn empty_choices_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client_for(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(err, QuizBuilderError::Upstream { status: 200, .. }));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "choices": [{"message": {"content": "trop tard"}}]
                    }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = complete_within(&client, &request(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizBuilderError::GenerationTimeout { .. }));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = Url::parse(&format!("http://127.0.0.1:{port}/v1/chat/completions")).unwrap();
        let client = ChatClient::new(endpoint, "sk-test").unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, QuizBuilderError::Network(_)));
    }

    #[test]
    fn from_config_requires_api_key() {
        let mut config = AppConfig::default();
        config.llm.api_key_env = "QB_TEST_LLM_MISSING_KEY_98765".into();
        let err = ChatClient::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("QB_TEST_LLM_MISSING_KEY_98765"));
    }
}
