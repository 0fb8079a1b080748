use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::FeedbackRecord;

/// First line of every agent-level fallback error list
pub const GENERIC_FAILURE: &str = "LLM processing error or invalid JSON output.";

/// The four workflow stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Correctness,
    Language,
    Improvement,
    Metadata,
}

impl Stage {
    pub const ORDER: [Stage; 4] = [
        Stage::Correctness,
        Stage::Language,
        Stage::Improvement,
        Stage::Metadata,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Correctness => "correctness",
            Stage::Language => "language",
            Stage::Improvement => "improvement",
            Stage::Metadata => "metadata",
        }
    }

    /// Name of the prompt template file, without extension
    pub fn template_name(self) -> &'static str {
        match self {
            Stage::Correctness => "correctness_prompt",
            Stage::Language => "language_prompt",
            Stage::Improvement => "improvement_prompt",
            Stage::Metadata => "metadata_prompt",
        }
    }

    pub fn default_temperature(self) -> f32 {
        match self {
            Stage::Correctness => 0.7,
            Stage::Language => 0.3,
            Stage::Improvement => 0.5,
            Stage::Metadata => 0.1,
        }
    }

    /// Degraded record in the stage's own shape.
    ///
    /// `input_text` is only used by the improvement stage, which falls back to
    /// returning the text it was given.
    pub fn fallback(
        self,
        input_text: &str,
        errors: Vec<String>,
        explanation: String,
    ) -> FeedbackRecord {
        match self {
            Stage::Correctness => json!({
                "is_correct": false,
                "errors": errors,
                "explanation": explanation,
            }),
            Stage::Language => json!({
                "issues_found": true,
                "feedback": errors,
                "explanation": explanation,
            }),
            Stage::Improvement => json!({
                "improved_question": input_text,
                "justification": explanation,
            }),
            Stage::Metadata => json!({
                "topic": "Error",
                "subtopic": "Error",
                "blooms_level": "Error",
                "difficulty": "Error",
                "errors": errors,
            }),
        }
    }

    /// Fallback returned by an agent whose generation or decoding failed
    pub fn agent_fallback(self, input_text: &str, message: &str) -> FeedbackRecord {
        self.fallback(
            input_text,
            vec![GENERIC_FAILURE.to_string(), message.to_string()],
            format!("An error occurred during AI processing: {}", message),
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
