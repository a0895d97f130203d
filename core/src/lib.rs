// Trellis Core Library
// Planner / controller / orchestrator agents for OpenAPI-described HTTP APIs

pub mod agent;
pub mod catalog;
pub mod context;
pub mod controller;
pub mod legacy;
pub mod llm;
pub mod orchestrator;
pub mod planner;
pub mod prompt;
pub mod summarize;
pub mod tools;

// Export core types
pub use agent::{AgentExecutor, ExecutionTrace, ExecutorConfig, Termination, TraceStep};
pub use catalog::{Endpoint, OperationCatalog};
pub use controller::{ApiController, ControllerConfig};
pub use llm::{LanguageModel, LlmClient, LlmClientConfig};
pub use orchestrator::{ApiOrchestrator, OrchestratorConfig, OrchestratorOutcome, Phase, UserRequest};
pub use planner::{ApiPlanner, Plan, PlanStep, StepKind};
pub use prompt::PromptTemplate;
pub use summarize::ResponseGenerator;
pub use tools::{DeleteAuthorization, Method, RequestsWrapper, Tool, ToolError, ToolRegistry};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrellisError {
    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Prompt error: {0}")]
    PromptError(String),

    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Agent error: {0}")]
    AgentError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}
pub type Result<T> = std::result::Result<T, TrellisError>;
