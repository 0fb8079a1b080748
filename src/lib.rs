pub mod io;
pub mod llm;
pub mod models;
pub mod service;
pub mod stages;

pub use io::{StoreError, VersionStore};
pub use llm::{
    GeminiClient, GeminiConfig, GenerationError, PromptTemplate, TextGenerator, extract_json,
};
pub use models::{FeedbackRecord, NewVersion, QuestionState, VersionRecord};
pub use service::{ProcessedQuestion, QuestionService, ServiceError};
pub use stages::{Stage, StageAgent, StageSettings, Workflow};
