// Database-backed PipelineStore implementation
//
// This module implements the core PipelineStore trait so the run pipeline can
// read model configs and history and write results and run status.

use async_trait::async_trait;
use codepair_core::{
    traits::PipelineStore, ModelConfig, NewRunResult, PipelineError, Result, Role, RunResult,
    RunStatus, Turn,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::repositories::Database;

// ============================================================================
// DbPipelineStore - Pipeline persistence in the database
// ============================================================================

/// Database-backed pipeline store
#[derive(Clone)]
pub struct DbPipelineStore {
    db: Database,
}

impl DbPipelineStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn store_error(e: anyhow::Error) -> PipelineError {
    PipelineError::store(e.to_string())
}

#[async_trait]
impl PipelineStore for DbPipelineStore {
    async fn enabled_config(&self, session_id: Uuid, role: Role) -> Result<Option<ModelConfig>> {
        self.db
            .get_enabled_model_config(session_id, role)
            .await
            .map_err(store_error)?
            .map(ModelConfig::try_from)
            .transpose()
            .map_err(store_error)
    }

    async fn recent_turns(
        &self,
        session_id: Uuid,
        role: Role,
        exclude_run_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Turn>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .db
            .recent_turns(session_id, role, exclude_run_id, limit)
            .await
            .map_err(store_error)?;

        Ok(rows.into_iter().map(Turn::from).collect())
    }

    async fn create_run_result(&self, input: NewRunResult) -> Result<RunResult> {
        let row = self
            .db
            .create_run_result(
                input.run_id,
                input.model_config_id,
                input.role,
                &input.output,
                input.status,
            )
            .await
            .map_err(store_error)?;

        RunResult::try_from(row).map_err(store_error)
    }

    async fn finish_run(&self, run_id: Uuid, status: RunStatus) -> Result<bool> {
        self.db
            .finish_run(run_id, status)
            .await
            .map_err(store_error)
    }
}

// ============================================================================
// Factory functions
// ============================================================================

/// Create a shared pipeline store over a database
pub fn create_db_pipeline_store(db: Database) -> Arc<dyn PipelineStore> {
    Arc::new(DbPipelineStore::new(db))
}
