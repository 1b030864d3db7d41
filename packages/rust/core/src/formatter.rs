//! Structured formatting: model prose in, typed questions out.
//!
//! A second, near-deterministic model call is asked to convert the generator's
//! prose into JSON. Its reply goes through the extraction chain in
//! `quizbuilder-extract`, then [`interpret`] reconciles the payload with the
//! shape the current stage expects and decodes each question.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use quizbuilder_extract::parse_json;
use quizbuilder_llm::{ChatBackend, ChatRequest, complete_within, truncate_chars};
use quizbuilder_shared::{
    ChatMessage, FormatErrorReason, ModelCallConfig, Question, QuestionSet, QuizBuilderError,
    Result, Shape,
};

use crate::prompts;

// ---------------------------------------------------------------------------
// Formatting endpoint wire types
// ---------------------------------------------------------------------------

/// Body of a formatting request: raw model text plus the expected shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatRequest {
    pub raw_response: String,
    #[serde(default)]
    pub is_array: bool,
}

impl FormatRequest {
    pub fn shape(&self) -> Shape {
        if self.is_array { Shape::Array } else { Shape::Single }
    }
}

/// Result of a formatting request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormatResponse {
    Formatted {
        #[serde(rename = "formattedResponse")]
        formatted_response: Value,
    },
    Failed {
        error: String,
        message: String,
        #[serde(rename = "rawContent")]
        raw_content: String,
    },
}

impl FormatResponse {
    fn formatted(set: &QuestionSet) -> Result<Self> {
        let formatted_response = serde_json::to_value(set)
            .map_err(|e| QuizBuilderError::validation(format!("cannot encode questions: {e}")))?;
        Ok(Self::Formatted { formatted_response })
    }

    /// Failure body. `raw` is cut to `limit` characters.
    pub fn failed(err: &QuizBuilderError, raw: &str, limit: usize) -> Self {
        Self::Failed {
            error: err.code().to_string(),
            message: err.to_string(),
            raw_content: truncate_chars(raw, limit),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Formatted { .. })
    }
}

// ---------------------------------------------------------------------------
// Formatter
// ---------------------------------------------------------------------------

/// Converts raw generator prose into a [`QuestionSet`] of the expected shape.
pub struct StructuredFormatter<'a, B> {
    backend: &'a B,
    model: &'a str,
    call: &'a ModelCallConfig,
}

impl<'a, B: ChatBackend> StructuredFormatter<'a, B> {
    pub fn new(backend: &'a B, model: &'a str, call: &'a ModelCallConfig) -> Self {
        Self {
            backend,
            model,
            call,
        }
    }

    /// Ask the model to convert `raw` to JSON and interpret its reply.
    #[instrument(skip_all, fields(shape = ?shape, raw_chars = raw.chars().count()))]
    pub async fn format(&self, raw: &str, shape: Shape) -> Result<QuestionSet> {
        let reply = self.request_json(raw, shape).await?;
        interpret(&reply, shape)
    }

    /// Serve one formatting-endpoint request. Never fails: errors become
    /// a [`FormatResponse::Failed`] body.
    pub async fn handle(&self, request: &FormatRequest, raw_content_limit: usize) -> FormatResponse {
        let shape = request.shape();

        let reply = match self.request_json(&request.raw_response, shape).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "formatting call failed");
                return FormatResponse::failed(&e, &request.raw_response, raw_content_limit);
            }
        };

        match interpret(&reply, shape).and_then(|set| FormatResponse::formatted(&set)) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "formatting reply rejected");
                FormatResponse::failed(&e, &reply, raw_content_limit)
            }
        }
    }

    async fn request_json(&self, raw: &str, shape: Shape) -> Result<String> {
        let request = ChatRequest {
            model: self.model.to_string(),
            messages: vec![
                ChatMessage::system(prompts::formatter_system_prompt(shape)),
                ChatMessage::user(prompts::formatter_user_message(raw, shape)),
            ],
            temperature: self.call.temperature,
            max_tokens: self.call.max_tokens,
        };
        complete_within(self.backend, &request, self.call.timeout()).await
    }
}

/// Parse a formatting reply and reconcile it with the expected shape.
///
/// - `Single` accepts an object, or a one-element array which is unwrapped.
///   The question must satisfy the full invariant.
/// - `Array` requires a non-empty array. Element problems are logged and the
///   element is kept, so a reviewer can repair it.
pub fn interpret(reply: &str, shape: Shape) -> Result<QuestionSet> {
    let parsed = parse_json(reply)?;

    match (shape, parsed.value) {
        (Shape::Single, value @ Value::Object(_)) => strict_single(&value).map(QuestionSet::Single),
        (Shape::Single, Value::Array(items)) => match items.as_slice() {
            [] => Err(QuizBuilderError::format(FormatErrorReason::EmptyArray)),
            [only] => strict_single(only).map(QuestionSet::Single),
            _ => Err(QuizBuilderError::format(
                FormatErrorReason::ExpectedSingleGotMany,
            )),
        },
        (Shape::Array, Value::Array(items)) if items.is_empty() => {
            Err(QuizBuilderError::format(FormatErrorReason::EmptyArray))
        }
        (Shape::Array, Value::Array(items)) => Ok(QuestionSet::Many(tolerant_batch(&items))),
        (Shape::Array, _) => Err(QuizBuilderError::format(FormatErrorReason::ShapeMismatch)),
        // parse_json only yields objects and arrays
        (Shape::Single, _) => Err(QuizBuilderError::format(FormatErrorReason::Unparseable)),
    }
}

fn strict_single(value: &Value) -> Result<Question> {
    let (question, issues) = Question::from_value(value);
    if issues.is_empty() {
        return Ok(question);
    }
    Err(QuizBuilderError::InvalidQuestion {
        issues: issues.iter().map(ToString::to_string).collect(),
    })
}

fn tolerant_batch(items: &[Value]) -> Vec<Question> {
    let mut flagged = 0usize;
    let questions: Vec<Question> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let (question, issues) = Question::from_value(item);
            if !issues.is_empty() {
                flagged += 1;
            }
            for issue in &issues {
                warn!(index, %issue, "variation failed validation, keeping it for review");
            }
            question
        })
        .collect();

    info!(count = questions.len(), flagged, "decoded question batch");
    questions
}
