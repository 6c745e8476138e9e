// Coder/Explainer Pipeline Core
//
// This crate provides the DB-agnostic core of codepair: two independent model
// agents (a coder and an explainer) driven through a streaming run pipeline.
//
// Key design decisions:
// - Uses traits (PipelineStore, ModelClient) for pluggable backends
// - Model runtimes register drivers in a DriverRegistry at startup
// - Conversation history is rebuilt from persisted runs on every invocation
// - The run pipeline is an explicit state machine emitting tagged events into a
//   bounded channel
// - Domain entity types (Session, ModelConfig, Run, RunResult) are defined here

// Domain entity types
pub mod catalog;
pub mod role;
pub mod run;
pub mod session;

pub mod config;
pub mod error;
pub mod events;
pub mod exercises;
pub mod history;
pub mod llm_drivers;
pub mod orchestrator;
pub mod pipeline;
pub mod traits;

// In-memory implementations for testing
pub mod memory;

// Re-exports for convenience
pub use catalog::{CatalogModel, Provider};
pub use config::PipelineSettings;
pub use error::{PipelineError, Result};
pub use events::{EventSender, PipelineEvent};
pub use exercises::{Exercise, ExerciseCatalog, ExerciseSummary, LanguageSummary};
pub use history::ConversationMemory;
pub use llm_drivers::{
    BoxedModelClient, DriverRegistry, FragmentStream, LlmMessage, LlmMessageRole, ModelClient,
    ModelSpec,
};
pub use orchestrator::Orchestrator;
pub use pipeline::{RunOutcome, RunPipeline, RunRequest, RunTarget, RunningPipeline};
pub use role::Role;
pub use run::{NewRunResult, Run, RunResult, RunResultStatus, RunStatus, RunWithResults, Turn};
pub use session::{ModelConfig, RunMode, Session, SessionDetail};
pub use traits::PipelineStore;
