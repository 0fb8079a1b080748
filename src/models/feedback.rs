use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw stage output: whatever the model returned inside its fenced block,
/// or the stage's fallback record
pub type FeedbackRecord = Value;

/// Correctness stage result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectnessFeedback {
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub explanation: String,
}

/// Language stage result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageFeedback {
    pub issues_found: Option<bool>,
    #[serde(default)]
    pub feedback: Vec<String>,
    #[serde(default)]
    pub explanation: String,
}

/// Improvement stage result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImprovementFeedback {
    #[serde(default)]
    pub improved_question: String,
    #[serde(default)]
    pub justification: String,
}

/// Metadata stage result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFeedback {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub subtopic: String,
    #[serde(default)]
    pub blooms_level: String,
    #[serde(default)]
    pub difficulty: String,
}

impl CorrectnessFeedback {
    pub fn from_record(record: &FeedbackRecord) -> Self {
        Self {
            is_correct: record.get("is_correct").and_then(Value::as_bool),
            errors: string_list(record.get("errors")),
            explanation: text(record.get("explanation")),
        }
    }
}

impl LanguageFeedback {
    pub fn from_record(record: &FeedbackRecord) -> Self {
        Self {
            issues_found: record.get("issues_found").and_then(Value::as_bool),
            feedback: string_list(record.get("feedback")),
            explanation: text(record.get("explanation")),
        }
    }
}

impl ImprovementFeedback {
    pub fn from_record(record: &FeedbackRecord) -> Self {
        Self {
            improved_question: text(record.get("improved_question")),
            justification: text(record.get("justification")),
        }
    }
}

impl MetadataFeedback {
    pub fn from_record(record: &FeedbackRecord) -> Self {
        Self {
            topic: text(record.get("topic")),
            subtopic: text(record.get("subtopic")),
            blooms_level: text(record.get("blooms_level")),
            difficulty: text(record.get("difficulty")),
        }
    }
}

/// Strings are taken as-is; other non-null values keep their JSON text
fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(|item| text(Some(item))).collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => vec![text(Some(other))],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_correctness_from_record() {
        let record = json!({
            "is_correct": false,
            "errors": ["Option B is also correct", 3],
            "explanation": "Two answers fit."
        });
        let feedback = CorrectnessFeedback::from_record(&record);
        assert_eq!(feedback.is_correct, Some(false));
        assert_eq!(feedback.errors, vec!["Option B is also correct", "3"]);
        assert_eq!(feedback.explanation, "Two answers fit.");
    }

    #[test]
    fn test_missing_fields_are_empty() {
        let feedback = LanguageFeedback::from_record(&json!({}));
        assert_eq!(feedback, LanguageFeedback::default());

        let feedback = MetadataFeedback::from_record(&json!(["not", "an", "object"]));
        assert_eq!(feedback, MetadataFeedback::default());
    }

    #[test]
    fn test_single_string_list_is_wrapped() {
        let feedback = LanguageFeedback::from_record(&json!({"feedback": "Missing comma"}));
        assert_eq!(feedback.feedback, vec!["Missing comma"]);
    }
}
