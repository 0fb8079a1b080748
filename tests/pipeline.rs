use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use questionqc::{
    GenerationError, QuestionService, StageAgent, StageSettings, TextGenerator, VersionStore,
    Workflow,
};

/// Replays one reply per call and records every prompt it was given
struct FakeGemini {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGemini {
    fn new(replies: Vec<Result<String, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TextGenerator for FakeGemini {
    async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

fn fenced(value: Value) -> Result<String, GenerationError> {
    Ok(format!("```json\n{}\n```", value))
}

fn build_service(fake: Arc<FakeGemini>, dir: &tempfile::TempDir) -> QuestionService {
    let agents = StageAgent::for_all_stages(fake, &StageSettings::default(), None).unwrap();
    let store = VersionStore::open(dir.path().join("question_versions.csv")).unwrap();
    QuestionService::new(Workflow::new(agents).unwrap(), store)
}

#[tokio::test]
async fn test_process_question_end_to_end() {
    let fake = FakeGemini::new(vec![
        fenced(json!({"is_correct": true, "errors": [], "explanation": "Valid arithmetic."})),
        fenced(json!({"issues_found": false, "feedback": [], "explanation": ""})),
        fenced(json!({"improved_question": "What is 2 + 2?", "justification": "Added spacing."})),
        fenced(json!({
            "topic": "Arithmetic",
            "subtopic": "Addition",
            "blooms_level": "Remember",
            "difficulty": "Easy"
        })),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(fake.clone(), &dir);

    let result = service.process("What is 2+2?", "alice").await.unwrap();

    assert_eq!(result.processed_question, "What is 2 + 2?");
    assert_eq!(result.original_question, "What is 2+2?");
    assert_eq!(result.version_number, 2);
    assert!(result.failures.is_empty());

    let history = service.versions(&result.question_id).unwrap();
    assert_eq!(history, result.version_history);
    assert_eq!(history.len(), 2);

    let submitted = &history[0];
    assert_eq!(submitted.version_number, 1);
    assert_eq!(submitted.created_by, "alice");
    assert_eq!(submitted.improved_text, "");
    assert!(submitted.correctness.is_none());
    assert!(submitted.language.is_none());
    assert!(submitted.improvement.is_none());
    assert!(submitted.metadata.is_none());

    let ai = &history[1];
    assert_eq!(ai.version_number, 2);
    assert_eq!(ai.created_by, "AI");
    assert_eq!(ai.original_text, "What is 2+2?");
    assert_eq!(ai.improved_text, "What is 2 + 2?");

    let correctness = ai.correctness.as_ref().unwrap();
    assert_eq!(correctness.is_correct, Some(true));
    assert!(correctness.errors.is_empty());
    assert_eq!(correctness.explanation, "Valid arithmetic.");

    let language = ai.language.as_ref().unwrap();
    assert_eq!(language.issues_found, Some(false));
    assert!(language.feedback.is_empty());

    let improvement = ai.improvement.as_ref().unwrap();
    assert_eq!(improvement.improved_question, "What is 2 + 2?");
    assert_eq!(improvement.justification, "Added spacing.");

    let metadata = ai.metadata.as_ref().unwrap();
    assert_eq!(metadata.topic, "Arithmetic");
    assert_eq!(metadata.subtopic, "Addition");
    assert_eq!(metadata.blooms_level, "Remember");
    assert_eq!(metadata.difficulty, "Easy");

    // Only the metadata stage sees the rewritten text
    let prompts = fake.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 4);
    assert!(prompts[..3].iter().all(|p| p.contains("What is 2+2?")));
    assert!(prompts[3].contains("What is 2 + 2?"));
}

#[tokio::test]
async fn test_improvement_failure_keeps_original_text() {
    let fake = FakeGemini::new(vec![
        fenced(json!({"is_correct": true, "errors": [], "explanation": "ok"})),
        fenced(json!({"issues_found": false, "feedback": [], "explanation": ""})),
        Err(GenerationError::Api {
            status: 503,
            body: "unavailable".to_string(),
        }),
        fenced(json!({"topic": "Arithmetic", "subtopic": "Addition", "blooms_level": "Remember", "difficulty": "Easy"})),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(fake.clone(), &dir);

    let result = service.process("What is 2+2?", "alice").await.unwrap();

    assert_eq!(result.processed_question, "What is 2+2?");
    let prompts = fake.prompts.lock().unwrap();
    assert!(prompts[3].contains("What is 2+2?"));

    let ai = &result.version_history[1];
    assert_eq!(ai.improved_text, "What is 2+2?");
    let justification = &ai.improvement.as_ref().unwrap().justification;
    assert!(justification.starts_with("An error occurred during AI processing:"));
    assert!(justification.contains("503"));
    assert_eq!(result.failures.len(), 1);
}

#[tokio::test]
async fn test_questions_are_kept_apart() {
    let fake = FakeGemini::new(vec![]);
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(fake, &dir);

    let first = service.process("First?", "alice").await.unwrap();
    let second = service.process("Second?", "bob").await.unwrap();

    assert_ne!(first.question_id, second.question_id);
    assert_eq!(second.version_number, 2);
    assert!(
        second
            .version_history
            .iter()
            .all(|v| v.question_id == second.question_id)
    );
}
