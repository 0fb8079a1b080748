use std::path::Path;

use thiserror::Error;

use crate::stages::Stage;

/// Substitution point for the question text
pub const PLACEHOLDER: &str = "{question_text}";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template '{name}' has no {{question_text}} placeholder")]
    MissingPlaceholder { name: String },

    #[error("Failed to read prompt template {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A prompt with exactly one substitution point for the question text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    body: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Result<Self, PromptError> {
        let name = name.into();
        let body = body.into();
        if !body.contains(PLACEHOLDER) {
            return Err(PromptError::MissingPlaceholder { name });
        }
        Ok(Self { name, body })
    }

    /// Load `<dir>/<name>.txt`
    pub fn load(dir: &Path, name: &str) -> Result<Self, PromptError> {
        let path = dir.join(format!("{}.txt", name));
        let body = std::fs::read_to_string(&path).map_err(|source| PromptError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::new(name, body)
    }

    /// Built-in template for a stage
    pub fn builtin(stage: Stage) -> Self {
        let body = match stage {
            Stage::Correctness => CORRECTNESS_PROMPT,
            Stage::Language => LANGUAGE_PROMPT,
            Stage::Improvement => IMPROVEMENT_PROMPT,
            Stage::Metadata => METADATA_PROMPT,
        };
        Self {
            name: stage.template_name().to_string(),
            body: body.to_string(),
        }
    }

    /// Load a stage's template from `dir` if given, else use the built-in one
    pub fn for_stage(stage: Stage, dir: Option<&Path>) -> Result<Self, PromptError> {
        match dir {
            Some(dir) => Self::load(dir, stage.template_name()),
            None => Ok(Self::builtin(stage)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fill the template with the question text
    pub fn render(&self, question_text: &str) -> String {
        self.body.replace(PLACEHOLDER, question_text)
    }
}

const CORRECTNESS_PROMPT: &str = r#"You are an expert exam reviewer. Check the following question for factual and logical correctness.
If it is a multiple-choice question, verify that exactly one option is correct and that the answer key is right.

Question:
{question_text}

Respond with a single JSON object in a ```json fenced block with these fields:
- "is_correct": boolean
- "errors": list of strings describing each problem (empty if none)
- "explanation": short string explaining your verdict"#;

const LANGUAGE_PROMPT: &str = r#"You are a copy editor for exam questions. Review the following question for grammar, spelling, clarity and ambiguity.

Question:
{question_text}

Respond with a single JSON object in a ```json fenced block with these fields:
- "issues_found": boolean
- "feedback": list of strings, one per issue (empty if none)
- "explanation": short summary string"#;

const IMPROVEMENT_PROMPT: &str = r#"You are an assessment designer. Rewrite the following question so that it is correct, clear and unambiguous while keeping its intent and difficulty.
Keep the original format (for example keep all options of a multiple-choice question).

Question:
{question_text}

Respond with a single JSON object in a ```json fenced block with these fields:
- "improved_question": the full rewritten question as a string
- "justification": short string explaining what was changed and why"#;

const METADATA_PROMPT: &str = r#"You classify exam questions. Tag the following question.

Question:
{question_text}

Respond with a single JSON object in a ```json fenced block with these string fields:
- "topic"
- "subtopic"
- "blooms_level": one of Remember, Understand, Apply, Analyze, Evaluate, Create
- "difficulty": one of Easy, Medium, Hard"#;
