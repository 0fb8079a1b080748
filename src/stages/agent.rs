use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::Stage;
use crate::llm::{
    ExtractError, GenerationError, PromptError, PromptTemplate, TextGenerator, extract_json,
};
use crate::models::{FailureKind, FeedbackRecord, StageFailure};

/// Per-stage sampling temperatures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSettings {
    pub correctness_temperature: f32,
    pub language_temperature: f32,
    pub improvement_temperature: f32,
    pub metadata_temperature: f32,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            correctness_temperature: Stage::Correctness.default_temperature(),
            language_temperature: Stage::Language.default_temperature(),
            improvement_temperature: Stage::Improvement.default_temperature(),
            metadata_temperature: Stage::Metadata.default_temperature(),
        }
    }
}

impl StageSettings {
    pub fn temperature(&self, stage: Stage) -> f32 {
        match stage {
            Stage::Correctness => self.correctness_temperature,
            Stage::Language => self.language_temperature,
            Stage::Improvement => self.improvement_temperature,
            Stage::Metadata => self.metadata_temperature,
        }
    }
}

/// Failure inside one agent call; never escapes [`StageAgent::run_detailed`]
#[derive(Debug, Error)]
enum AgentError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl AgentError {
    fn kind(&self) -> FailureKind {
        match self {
            AgentError::Generation(_) => FailureKind::Generation,
            AgentError::Extract(ExtractError::NoJsonBlockFound) => FailureKind::NoJsonBlock,
            AgentError::Extract(ExtractError::MalformedJson(_)) => FailureKind::MalformedJson,
        }
    }
}

/// Feedback plus the reason it is a fallback, if it is one
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub feedback: FeedbackRecord,
    pub failure: Option<StageFailure>,
}

/// One prompt, one generation call, one JSON extraction
pub struct StageAgent {
    stage: Stage,
    template: PromptTemplate,
    temperature: f32,
    generator: Arc<dyn TextGenerator>,
}

impl StageAgent {
    pub fn new(
        stage: Stage,
        template: PromptTemplate,
        temperature: f32,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            stage,
            template,
            temperature,
            generator,
        }
    }

    /// Build all four agents, loading templates from `prompts_dir` when given
    pub fn for_all_stages(
        generator: Arc<dyn TextGenerator>,
        settings: &StageSettings,
        prompts_dir: Option<&Path>,
    ) -> Result<Vec<StageAgent>, PromptError> {
        Stage::ORDER
            .into_iter()
            .map(|stage| {
                let template = PromptTemplate::for_stage(stage, prompts_dir)?;
                Ok(StageAgent::new(
                    stage,
                    template,
                    settings.temperature(stage),
                    Arc::clone(&generator),
                ))
            })
            .collect()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Run the stage, returning the parsed reply or the stage's fallback record
    pub async fn run(&self, question_text: &str) -> FeedbackRecord {
        self.run_detailed(question_text).await.feedback
    }

    /// Like [`StageAgent::run`], but also reports why a fallback was used
    pub async fn run_detailed(&self, question_text: &str) -> StageOutcome {
        let prompt = self.template.render(question_text);

        match self.generate_feedback(&prompt).await {
            Ok(feedback) => StageOutcome {
                feedback,
                failure: None,
            },
            Err(e) => {
                let message = e.to_string();
                warn!("Error in {} agent: {}", self.stage, message);
                StageOutcome {
                    feedback: self.stage.agent_fallback(question_text, &message),
                    failure: Some(StageFailure {
                        stage: self.stage,
                        kind: e.kind(),
                        message,
                    }),
                }
            }
        }
    }

    async fn generate_feedback(&self, prompt: &str) -> Result<FeedbackRecord, AgentError> {
        let text = self.generator.generate(prompt, self.temperature).await?;
        debug!("[{} agent] Raw response: {:?}", self.stage, text);

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse.into());
        }

        Ok(extract_json(&text)?)
    }
}
