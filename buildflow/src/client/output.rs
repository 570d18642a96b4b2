//! Post-processing of final model answers.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use super::ResponseMode;
use crate::core::TokenUsage;
use crate::errors::ClientError;
use crate::utils::truncate_for_display;

/// A successful model call after post-processing.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    /// Parsed JSON in JSON mode; a JSON string in text mode.
    pub content: Value,
    /// Answer text with reasoning blocks removed.
    pub text: String,
    /// Reasoning blocks found inline in the answer.
    pub reasoning: Vec<String>,
    /// Token counts for the call.
    pub usage: TokenUsage,
}

#[allow(clippy::expect_used)]
static REASONING_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(think|thinking)>(.*?)</(?:think|thinking)>").expect("valid pattern")
});

#[allow(clippy::expect_used)]
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("valid pattern")
});

/// Removes `<think>` and `<thinking>` blocks, returning the rest and the
/// blocks' contents.
#[must_use]
pub fn strip_reasoning(text: &str) -> (String, Vec<String>) {
    let re = &*REASONING_BLOCK;
    let reasoning = re
        .captures_iter(text)
        .filter_map(|c| c.get(2))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let stripped = re.replace_all(text, "").trim().to_string();
    (stripped, reasoning)
}

/// Parses a JSON answer, tolerating a markdown fence or surrounding prose.
///
/// # Errors
///
/// Returns [`ClientError::OutputShape`] when no JSON document can be found.
pub fn parse_json_answer(text: &str) -> Result<Value, ClientError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }
    if let Some(inner) = FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        if let Ok(value) = serde_json::from_str(inner.as_str().trim()) {
            return Ok(value);
        }
    }
    if let Some(value) = outermost_json(trimmed) {
        return Ok(value);
    }
    Err(ClientError::output_shape(
        "$",
        "JSON document",
        if trimmed.is_empty() {
            "empty answer".to_string()
        } else {
            truncate_for_display(trimmed, 80)
        },
    ))
}

/// Tries the span from the first `{` or `[` to the matching last delimiter.
fn outermost_json(text: &str) -> Option<Value> {
    [('{', '}'), ('[', ']')].into_iter().find_map(|(open, close)| {
        let start = text.find(open)?;
        let end = text.rfind(close)?;
        (end > start)
            .then(|| serde_json::from_str(&text[start..=end]).ok())
            .flatten()
    })
}

/// Turns a raw answer into a [`ModelOutput`].
///
/// # Errors
///
/// Returns an output-shape error when a JSON answer does not parse.
pub fn finish_answer(
    text: &str,
    usage: TokenUsage,
    mode: ResponseMode,
) -> Result<ModelOutput, ClientError> {
    let (clean, reasoning) = strip_reasoning(text);
    let content = match mode {
        ResponseMode::Json => parse_json_answer(&clean)?,
        ResponseMode::Text => Value::String(clean.clone()),
    };
    Ok(ModelOutput {
        content,
        text: clean,
        reasoning,
        usage,
    })
}
