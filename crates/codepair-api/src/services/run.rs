// Run service: validates a submission, records the run and starts the pipeline

use anyhow::Context;
use codepair_core::{Role, Run, RunPipeline, RunRequest, RunTarget, RunningPipeline};
use codepair_storage::{CreateRun, Database};
use std::sync::Arc;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::runs::CreateRunRequest;

pub struct RunService {
    db: Arc<Database>,
    pipeline: RunPipeline,
}

impl RunService {
    pub fn new(db: Arc<Database>, pipeline: RunPipeline) -> Self {
        Self { db, pipeline }
    }

    /// Create a pending run for the session and start streaming it
    ///
    /// Nothing is persisted when the request is invalid or the session does
    /// not belong to the acting user.
    pub async fn start(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        target: RunTarget,
        req: CreateRunRequest,
    ) -> ServiceResult<RunningPipeline> {
        let initiator_role = validate_run_request(&req)?;

        self.db
            .get_session(user_id, session_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Session"))?;

        let row = self
            .db
            .create_run(CreateRun {
                session_id,
                prompt: req.prompt.unwrap_or_default(),
                initiator_role,
            })
            .await
            .context("Failed to create run")?;

        if let Err(e) = self.db.touch_session(session_id).await {
            tracing::warn!(session_id = %session_id, "Failed to update session activity: {}", e);
        }

        let run = Run::try_from(row)?;
        tracing::info!(run_id = %run.id, session_id = %session_id, target = %target, "Run created");

        Ok(self.pipeline.start(build_request(run, target, req.coder_output, req.reuse_last_code)))
    }
}

/// Check a submission before anything is written; returns the initiator role
pub fn validate_run_request(req: &CreateRunRequest) -> ServiceResult<Role> {
    match req.prompt.as_deref() {
        Some(prompt) if !prompt.trim().is_empty() => {}
        _ => return Err(ServiceError::validation("Prompt is required")),
    }

    match req.initiator_role.as_deref() {
        None => Ok(Role::Coder),
        Some(role) => Ok(role.parse()?),
    }
}

fn build_request(
    run: Run,
    target: RunTarget,
    coder_output: Option<String>,
    reuse_last_code: bool,
) -> RunRequest {
    let request = RunRequest::new(run, target).with_reuse_last_code(reuse_last_code);
    match coder_output {
        Some(code) if !code.trim().is_empty() => request.with_coder_output(code),
        _ => request,
    }
}
