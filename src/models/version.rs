use serde::{Deserialize, Serialize};

use super::{
    CorrectnessFeedback, ImprovementFeedback, LanguageFeedback, MetadataFeedback, QuestionState,
};

/// Author tag for versions produced by the workflow
pub const AI_AUTHOR: &str = "AI";

/// One immutable snapshot of a question, keyed by (question_id, version_number)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub question_id: String,
    /// Starts at 1, strictly increasing per question_id
    pub version_number: u32,
    /// RFC 3339, local time
    pub timestamp: String,
    pub created_by: String,
    pub original_text: String,
    /// Empty for caller-submitted versions
    pub improved_text: String,
    #[serde(rename = "correctness_feedback")]
    pub correctness: Option<CorrectnessFeedback>,
    #[serde(rename = "language_feedback")]
    pub language: Option<LanguageFeedback>,
    #[serde(rename = "improvement_feedback")]
    pub improvement: Option<ImprovementFeedback>,
    pub metadata: Option<MetadataFeedback>,
}

/// A version waiting for its number and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewVersion {
    pub question_id: String,
    pub created_by: String,
    pub original_text: String,
    pub improved_text: String,
    pub correctness: Option<CorrectnessFeedback>,
    pub language: Option<LanguageFeedback>,
    pub improvement: Option<ImprovementFeedback>,
    pub metadata: Option<MetadataFeedback>,
}

impl NewVersion {
    /// The caller's text as submitted, without feedback
    pub fn submitted(
        question_id: impl Into<String>,
        created_by: impl Into<String>,
        original_text: impl Into<String>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            created_by: created_by.into(),
            original_text: original_text.into(),
            improved_text: String::new(),
            correctness: None,
            language: None,
            improvement: None,
            metadata: None,
        }
    }

    /// The workflow's output, authored by [`AI_AUTHOR`]
    pub fn from_state(question_id: impl Into<String>, state: &QuestionState) -> Self {
        Self {
            question_id: question_id.into(),
            created_by: AI_AUTHOR.to_string(),
            original_text: state.original_question_text().to_string(),
            improved_text: state.question_text().to_string(),
            correctness: Some(CorrectnessFeedback::from_record(&state.correctness_feedback)),
            language: Some(LanguageFeedback::from_record(&state.language_feedback)),
            improvement: Some(ImprovementFeedback::from_record(&state.improvement_feedback)),
            metadata: Some(MetadataFeedback::from_record(&state.metadata_feedback)),
        }
    }

    /// Assign a version number and stamp the current time
    pub fn into_record(self, version_number: u32) -> VersionRecord {
        VersionRecord {
            question_id: self.question_id,
            version_number,
            timestamp: chrono::Local::now().to_rfc3339(),
            created_by: self.created_by,
            original_text: self.original_text,
            improved_text: self.improved_text,
            correctness: self.correctness,
            language: self.language,
            improvement: self.improvement,
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_submitted_has_no_feedback() {
        let record = NewVersion::submitted("q1", "alice", "What is 2+2?").into_record(1);
        assert_eq!(record.version_number, 1);
        assert_eq!(record.created_by, "alice");
        assert!(record.improved_text.is_empty());
        assert!(record.correctness.is_none());
        assert!(record.metadata.is_none());
        assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
    }

    #[test]
    fn test_from_state_uses_final_text() {
        let mut state = QuestionState::new("What is 2+2?");
        state.apply_improvement("What is 2 + 2?");
        state.metadata_feedback = json!({"topic": "Arithmetic", "difficulty": "Easy"});

        let version = NewVersion::from_state("q1", &state);
        assert_eq!(version.created_by, AI_AUTHOR);
        assert_eq!(version.original_text, "What is 2+2?");
        assert_eq!(version.improved_text, "What is 2 + 2?");
        let metadata = version.metadata.unwrap();
        assert_eq!(metadata.topic, "Arithmetic");
        assert_eq!(metadata.subtopic, "");
    }

    #[test]
    fn test_record_json_uses_feedback_names() {
        let record = NewVersion::submitted("q1", "alice", "Q").into_record(1);
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("correctness_feedback").is_some());
        assert!(value.get("metadata").is_some());
    }
}
