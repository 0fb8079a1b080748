use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// First fenced block, optionally tagged `json`. Inner content is captured lazily
/// so the match stops at the first closing fence.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)```(?:json)?\s*([\s\S]*?)\s*```").expect("fenced block pattern is valid")
});

/// Failures when decoding a model reply
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No valid JSON block found in input.")]
    NoJsonBlockFound,

    #[error("Malformed JSON in fenced block: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

/// Extract the first fenced code block from free-form model text and parse it as JSON.
///
/// There is no fallback for bare `{...}` outside a fence; replies without a
/// fence are rejected.
pub fn extract_json(text: &str) -> Result<Value, ExtractError> {
    let text = text.trim();

    let captures = FENCED_BLOCK
        .captures(text)
        .ok_or(ExtractError::NoJsonBlockFound)?;
    let inner = captures.get(1).map_or("", |m| m.as_str()).trim();

    Ok(serde_json::from_str(inner)?)
}
