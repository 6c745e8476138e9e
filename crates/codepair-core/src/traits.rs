// Core traits for pluggable backends
//
// The pipeline only talks to persistence through PipelineStore:
// - Postgres implementation in codepair-storage for production
// - In-memory implementation in `memory` for tests

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::role::Role;
use crate::run::{NewRunResult, RunResult, RunStatus, Turn};
use crate::session::ModelConfig;

/// Persistence operations the run pipeline depends on
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// The enabled model configuration of a role in a session, if any
    async fn enabled_config(&self, session_id: Uuid, role: Role) -> Result<Option<ModelConfig>>;

    /// Past turns of a role, newest first, at most `limit`.
    ///
    /// Only runs of `session_id` other than `exclude_run_id` that are no longer
    /// pending and have a successful result for `role` contribute.
    async fn recent_turns(
        &self,
        session_id: Uuid,
        role: Role,
        exclude_run_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Turn>>;

    /// Persist a phase result
    async fn create_run_result(&self, input: NewRunResult) -> Result<RunResult>;

    /// Move a pending run to a terminal status.
    ///
    /// Returns false when the run was not pending anymore.
    async fn finish_run(&self, run_id: Uuid, status: RunStatus) -> Result<bool>;
}
