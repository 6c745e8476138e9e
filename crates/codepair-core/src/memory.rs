// In-memory implementations for testing
//
// These implementations keep all data in memory, making them useful for:
// - Unit and integration tests of the run pipeline
// - Running the pipeline without a database

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::llm_drivers::{FragmentStream, LlmMessage, ModelClient};
use crate::role::Role;
use crate::run::{NewRunResult, Run, RunResult, RunResultStatus, RunStatus, Turn};
use crate::session::ModelConfig;
use crate::traits::PipelineStore;

// ============================================================================
// InMemoryPipelineStore - Stores configs, runs and results in memory
// ============================================================================

/// In-memory pipeline store
///
/// Runs and results are kept in insertion order, which is also their
/// chronological order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPipelineStore {
    configs: Arc<RwLock<Vec<ModelConfig>>>,
    runs: Arc<RwLock<Vec<Run>>>,
    results: Arc<RwLock<Vec<RunResult>>>,
    fail_result_writes: Arc<AtomicBool>,
}

impl InMemoryPipelineStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model configuration
    pub async fn add_config(&self, config: ModelConfig) {
        self.configs.write().await.push(config);
    }

    /// Create and store a pending run
    pub async fn create_run(
        &self,
        session_id: Uuid,
        prompt: impl Into<String>,
        initiator_role: Role,
    ) -> Run {
        let run = Run::new(session_id, prompt, initiator_role);
        self.runs.write().await.push(run.clone());
        run
    }

    /// Get a run by ID
    pub async fn run(&self, run_id: Uuid) -> Option<Run> {
        self.runs
            .read()
            .await
            .iter()
            .find(|r| r.id == run_id)
            .cloned()
    }

    /// All runs of a session, oldest first
    pub async fn runs(&self, session_id: Uuid) -> Vec<Run> {
        self.runs
            .read()
            .await
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect()
    }

    /// All results of a run, in write order
    pub async fn results(&self, run_id: Uuid) -> Vec<RunResult> {
        self.results
            .read()
            .await
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Make every subsequent result write fail
    pub fn set_fail_result_writes(&self, fail: bool) {
        self.fail_result_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PipelineStore for InMemoryPipelineStore {
    async fn enabled_config(&self, session_id: Uuid, role: Role) -> Result<Option<ModelConfig>> {
        Ok(self
            .configs
            .read()
            .await
            .iter()
            .rev()
            .find(|c| c.session_id == session_id && c.role == role && c.is_enabled)
            .cloned())
    }

    async fn recent_turns(
        &self,
        session_id: Uuid,
        role: Role,
        exclude_run_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Turn>> {
        let runs = self.runs.read().await;
        let results = self.results.read().await;

        let turns = runs
            .iter()
            .rev()
            .filter(|run| {
                run.session_id == session_id
                    && run.id != exclude_run_id
                    && run.status.is_terminal()
            })
            .filter_map(|run| {
                results
                    .iter()
                    .rev()
                    .find(|r| {
                        r.run_id == run.id
                            && r.role == role
                            && r.status == RunResultStatus::Success
                    })
                    .map(|r| Turn {
                        run_id: run.id,
                        prompt: run.prompt.clone(),
                        output: r.output.clone(),
                    })
            })
            .take(limit)
            .collect();

        Ok(turns)
    }

    async fn create_run_result(&self, input: NewRunResult) -> Result<RunResult> {
        if self.fail_result_writes.load(Ordering::SeqCst) {
            return Err(PipelineError::store("result write rejected"));
        }

        let result = RunResult {
            id: Uuid::now_v7(),
            run_id: input.run_id,
            model_config_id: input.model_config_id,
            role: input.role,
            output: input.output,
            status: input.status,
            created_at: Utc::now(),
        };
        self.results.write().await.push(result.clone());
        Ok(result)
    }

    async fn finish_run(&self, run_id: Uuid, status: RunStatus) -> Result<bool> {
        let mut runs = self.runs.write().await;
        match runs
            .iter_mut()
            .find(|r| r.id == run_id && r.status == RunStatus::Pending)
        {
            Some(run) => {
                run.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// MockModelClient - Streams predefined responses
// ============================================================================

/// How a mock stream ends after its fragments
#[derive(Debug, Clone, PartialEq)]
enum MockEnding {
    Done,
    Fail(String),
    Hang,
}

/// A mock model response
#[derive(Debug, Clone)]
pub struct MockResponse {
    fragments: Vec<String>,
    ending: MockEnding,
    /// Fail before the stream opens
    unavailable: Option<String>,
}

impl MockResponse {
    /// Stream the given fragments, then finish
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            ending: MockEnding::Done,
            unavailable: None,
        }
    }

    /// Stream the full text as a single fragment
    pub fn text(text: impl Into<String>) -> Self {
        Self::fragments([text.into()])
    }

    /// Refuse the call before any fragment
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            fragments: Vec::new(),
            ending: MockEnding::Done,
            unavailable: Some(message.into()),
        }
    }

    /// Fail with a model-unavailable error after the fragments
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.ending = MockEnding::Fail(message.into());
        self
    }

    /// Never finish after the fragments
    pub fn then_hang(mut self) -> Self {
        self.ending = MockEnding::Hang;
        self
    }
}

/// Mock model client for testing
///
/// Returns predefined responses in sequence and records every message list
/// it was called with.
#[derive(Debug, Default, Clone)]
pub struct MockModelClient {
    responses: Arc<RwLock<Vec<MockResponse>>>,
    call_index: Arc<RwLock<usize>>,
    call_log: Arc<RwLock<Vec<Vec<LlmMessage>>>>,
}

impl MockModelClient {
    /// Create a mock client without configured responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock client answering with `responses` in order
    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(RwLock::new(responses)),
            ..Self::default()
        }
    }

    /// Add a response to the queue
    pub async fn add_response(&self, response: MockResponse) {
        self.responses.write().await.push(response);
    }

    /// Get the call log
    pub async fn calls(&self) -> Vec<Vec<LlmMessage>> {
        self.call_log.read().await.clone()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn chat_stream(&self, messages: Vec<LlmMessage>) -> Result<FragmentStream> {
        self.call_log.write().await.push(messages);

        let mut index = self.call_index.write().await;
        let response = self
            .responses
            .read()
            .await
            .get(*index)
            .cloned()
            .unwrap_or_else(|| MockResponse::text("Mock response (no more responses configured)"));
        *index += 1;
        drop(index);

        if let Some(message) = response.unavailable {
            return Err(PipelineError::unavailable(message));
        }

        let fragments = stream::iter(response.fragments.into_iter().map(Ok::<String, PipelineError>));
        let stream: FragmentStream = match response.ending {
            MockEnding::Done => Box::pin(fragments),
            MockEnding::Fail(message) => Box::pin(
                fragments.chain(stream::once(async move {
                    Err(PipelineError::unavailable(message))
                })),
            ),
            MockEnding::Hang => Box::pin(fragments.chain(stream::pending())),
        };
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_finish_run_only_moves_pending_runs() {
        let store = InMemoryPipelineStore::new();
        let run = store.create_run(Uuid::now_v7(), "p", Role::Coder).await;

        assert!(store.finish_run(run.id, RunStatus::Success).await.unwrap());
        assert!(!store.finish_run(run.id, RunStatus::Error).await.unwrap());
        assert_eq!(store.run(run.id).await.unwrap().status, RunStatus::Success);
    }

    #[tokio::test]
    async fn test_failed_result_writes() {
        let store = InMemoryPipelineStore::new();
        store.set_fail_result_writes(true);

        let result = store
            .create_run_result(NewRunResult {
                run_id: Uuid::now_v7(),
                model_config_id: None,
                role: Role::Coder,
                output: "x".to_string(),
                status: RunResultStatus::Success,
            })
            .await;
        assert!(matches!(result, Err(PipelineError::Store(_))));
    }

    #[tokio::test]
    async fn test_mock_client_stream_then_fail() {
        let client = MockModelClient::with_responses(vec![
            MockResponse::fragments(["a", "b"]).then_fail("connection reset"),
            MockResponse::unavailable("refused"),
        ]);

        let items: Vec<_> = client
            .chat_stream(vec![LlmMessage::user("hi")])
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_deref().unwrap(), "a");
        assert_eq!(items[1].as_deref().unwrap(), "b");
        assert!(matches!(items[2], Err(PipelineError::ModelUnavailable(_))));

        let second = client.chat_stream(vec![LlmMessage::user("again")]).await;
        assert!(matches!(second, Err(PipelineError::ModelUnavailable(_))));
        assert_eq!(client.calls().await.len(), 2);
    }
}
