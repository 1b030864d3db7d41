//! JSON fragment extraction from free-form model replies.
//!
//! Models do not reliably honor "answer with JSON only". Extraction is an
//! ordered chain of pure strategies (see [`strategies`]), tried in this order:
//!
//! 1. a fenced block tagged `json`
//! 2. any fenced block
//! 3. the first balanced `{...}` / `[...]` span
//! 4. the whole reply
//!
//! [`parse_json`] parses the chosen span and, if that fails, retries once on
//! the widest bracketed span of the original reply.

pub mod strategies;

use serde_json::Value;
use tracing::debug;

use quizbuilder_shared::{FormatErrorReason, QuizBuilderError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Which strategy produced an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    JsonFence,
    AnyFence,
    BraceScan,
    Verbatim,
    /// Second-chance recovery over the whole reply.
    WideSpan,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JsonFence => "json_fence",
            Self::AnyFence => "any_fence",
            Self::BraceScan => "brace_scan",
            Self::Verbatim => "verbatim",
            Self::WideSpan => "wide_span",
        }
    }
}

/// A span of the reply selected by one strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extraction<'a> {
    pub strategy: Strategy,
    pub text: &'a str,
}

/// A successfully parsed JSON object or array.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedJson {
    pub value: Value,
    pub strategy: Strategy,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run the strategy chain and return the first span it yields.
///
/// Always succeeds: the last strategy is the verbatim reply.
pub fn extract(reply: &str) -> Extraction<'_> {
    let chain: [(Strategy, fn(&str) -> Option<&str>); 3] = [
        (Strategy::JsonFence, strategies::json_fence),
        (Strategy::AnyFence, strategies::any_fence),
        (Strategy::BraceScan, strategies::brace_scan),
    ];

    for (strategy, run) in chain {
        if let Some(text) = run(reply) {
            return Extraction { strategy, text };
        }
    }

    Extraction {
        strategy: Strategy::Verbatim,
        text: strategies::verbatim(reply),
    }
}

/// Extract and parse a JSON object or array from a model reply.
///
/// Scalars (`42`, `"texte"`, `true`) are not accepted as payloads.
pub fn parse_json(reply: &str) -> Result<ParsedJson> {
    let extraction = extract(reply);

    match parse_container(extraction.text) {
        Some(value) => {
            debug!(strategy = extraction.strategy.as_str(), "extracted JSON payload");
            return Ok(ParsedJson {
                value,
                strategy: extraction.strategy,
            });
        }
        None => debug!(
            strategy = extraction.strategy.as_str(),
            "extracted span is not valid JSON, trying wide span"
        ),
    }

    if let Some(value) = strategies::wide_span(reply).and_then(parse_container) {
        debug!("recovered JSON payload from wide span");
        return Ok(ParsedJson {
            value,
            strategy: Strategy::WideSpan,
        });
    }

    Err(QuizBuilderError::format(FormatErrorReason::Unparseable))
}

fn parse_container(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}
