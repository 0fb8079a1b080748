use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use super::{Stage, StageAgent};
use crate::models::{FailureKind, QuestionState, StageFailure};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow needs agents for {expected:?}, got {found:?}")]
    StageOrder {
        expected: Vec<Stage>,
        found: Vec<Stage>,
    },
}

/// Fixed chain: correctness -> language -> improvement -> metadata.
///
/// Nodes run strictly one after another. Only the metadata node sees the
/// text produced by the improvement node.
pub struct Workflow {
    agents: Vec<StageAgent>,
}

impl Workflow {
    /// Agents must be given in [`Stage::ORDER`]
    pub fn new(agents: Vec<StageAgent>) -> Result<Self, WorkflowError> {
        let found: Vec<Stage> = agents.iter().map(StageAgent::stage).collect();
        if found != Stage::ORDER {
            return Err(WorkflowError::StageOrder {
                expected: Stage::ORDER.to_vec(),
                found,
            });
        }
        Ok(Self { agents })
    }

    /// Run every stage over a fresh state and return the final state
    pub async fn run(&self, question_text: &str) -> QuestionState {
        let mut state = QuestionState::new(question_text);
        for agent in &self.agents {
            run_node(agent, &mut state).await;
        }
        info!(
            "Workflow finished: {} degraded stage(s), {} node error(s)",
            state.failures.len(),
            state.errors.len()
        );
        state
    }
}

/// One node: call the agent, absorbing a panic into the stage's fallback record
async fn run_node(agent: &StageAgent, state: &mut QuestionState) {
    let stage = agent.stage();
    info!("Calling {} agent...", stage);

    let input = state.question_text().to_string();
    let result = AssertUnwindSafe(agent.run_detailed(&input))
        .catch_unwind()
        .await;

    match result {
        Ok(outcome) => {
            if let Some(failure) = outcome.failure {
                state.failures.push(failure);
            }
            if stage == Stage::Improvement {
                if let Some(text) = outcome
                    .feedback
                    .get("improved_question")
                    .and_then(Value::as_str)
                {
                    state.apply_improvement(text);
                }
            }
            state.set_feedback(stage, outcome.feedback);
        }
        Err(payload) => {
            let message = format!("Error calling {} agent: {}", stage, panic_message(&*payload));
            error!("{}", message);
            state.set_feedback(
                stage,
                stage.fallback(&input, vec![message.clone()], message.clone()),
            );
            state.errors.push(message.clone());
            state.failures.push(StageFailure {
                stage,
                kind: FailureKind::Panicked,
                message,
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
