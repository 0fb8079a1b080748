use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::io::{StoreError, VersionStore};
use crate::models::{NewVersion, StageFailure, VersionRecord};
use crate::stages::Workflow;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("No versions found for question_id: {question_id}")]
    NotFound { question_id: String },

    #[error("Service was opened read-only; no workflow to run")]
    ReadOnly,
}

/// Result of processing one submitted question
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedQuestion {
    pub question_id: String,
    /// Version number of the AI-produced version
    pub version_number: u32,
    pub original_question: String,
    pub processed_question: String,
    pub version_history: Vec<VersionRecord>,
    /// Stages that returned a fallback record; empty when every stage succeeded
    pub failures: Vec<StageFailure>,
}

/// Runs the workflow for submitted questions and keeps their version history
pub struct QuestionService {
    workflow: Option<Workflow>,
    store: VersionStore,
}

impl QuestionService {
    pub fn new(workflow: Workflow, store: VersionStore) -> Self {
        Self {
            workflow: Some(workflow),
            store,
        }
    }

    /// History and export only; `process` fails with `ReadOnly`
    pub fn read_only(store: VersionStore) -> Self {
        Self {
            workflow: None,
            store,
        }
    }

    /// Store the submitted text, run every stage, store the AI version.
    ///
    /// Stage failures are reported inside the result; only storage errors fail the call.
    pub async fn process(
        &self,
        question_text: &str,
        created_by: &str,
    ) -> Result<ProcessedQuestion, ServiceError> {
        let workflow = self.workflow.as_ref().ok_or(ServiceError::ReadOnly)?;
        let question_id = uuid::Uuid::new_v4().to_string();
        info!("Processing question {} submitted by {}", question_id, created_by);

        self.store.append_next(NewVersion::submitted(
            question_id.as_str(),
            created_by,
            question_text,
        ))?;

        let state = workflow.run(question_text).await;

        let ai_version = self
            .store
            .append_next(NewVersion::from_state(question_id.as_str(), &state))?;

        let version_history = self.store.list(&question_id)?;

        Ok(ProcessedQuestion {
            question_id,
            version_number: ai_version.version_number,
            original_question: state.original_question_text().to_string(),
            processed_question: state.question_text().to_string(),
            version_history,
            failures: state.failures,
        })
    }

    /// Every stored version of a question, in file order
    pub fn versions(&self, question_id: &str) -> Result<Vec<VersionRecord>, ServiceError> {
        let versions = self.store.list(question_id)?;
        if versions.is_empty() {
            return Err(ServiceError::NotFound {
                question_id: question_id.to_string(),
            });
        }
        Ok(versions)
    }

    /// The raw version table
    pub fn export(&self) -> Result<String, ServiceError> {
        Ok(self.store.read_raw()?)
    }
}
