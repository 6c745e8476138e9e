// Run HTTP route: submit a prompt and stream the agents' output
//
// The response body is NDJSON: one `{sender, text}` or `{sender, error}` object
// per line, flushed as soon as the pipeline produces it. The stream ends when
// the run reaches a terminal status.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use codepair_core::{RunPipeline, RunTarget, RunningPipeline};
use codepair_storage::Database;
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::ActingUser;
use crate::common::{api_error, ApiError, ErrorResponse};
use crate::services::RunService;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";
pub const RUN_ID_HEADER: &str = "x-run-id";
const ACCEL_BUFFERING_HEADER: &str = "x-accel-buffering";

#[derive(Clone)]
pub struct AppState {
    pub run_service: Arc<RunService>,
}

impl AppState {
    pub fn new(db: Arc<Database>, pipeline: RunPipeline) -> Self {
        Self {
            run_service: Arc::new(RunService::new(db, pipeline)),
        }
    }
}

/// Request to run a prompt through the session's agents
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateRunRequest {
    /// The developer's question. Required, must not be blank.
    #[serde(default)]
    #[schema(example = "Write a function that reverses a string")]
    pub prompt: Option<String>,
    /// Who initiated the run: coder (default) or explainer.
    #[serde(default)]
    #[schema(example = "coder")]
    pub initiator_role: Option<String>,
    /// Code to explain (explainer target only).
    #[serde(default)]
    pub coder_output: Option<String>,
    /// Explain the session's latest successful coder output when no
    /// coder_output is given (explainer target only).
    #[serde(default)]
    pub reuse_last_code: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RunParams {
    /// pipeline (default) or explainer
    pub target: Option<String>,
}

impl RunParams {
    fn target(&self) -> Result<RunTarget, ApiError> {
        match self.target.as_deref() {
            None => Ok(RunTarget::default()),
            Some(target) => target.parse().map_err(|e: codepair_core::PipelineError| {
                api_error(StatusCode::BAD_REQUEST, e.to_string())
            }),
        }
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/sessions/:session_id/run", post(run_session))
        .with_state(state)
}

/// POST /v1/sessions/{session_id}/run - Run a prompt and stream the output
#[utoipa::path(
    post,
    path = "/v1/sessions/{session_id}/run",
    params(
        ("session_id" = Uuid, Path, description = "Session ID"),
        RunParams
    ),
    request_body = CreateRunRequest,
    responses(
        (status = 200, description = "NDJSON stream of {sender, text} / {sender, error} events", body = String, content_type = "application/x-ndjson"),
        (status = 400, description = "Invalid prompt, role or target", body = ErrorResponse),
        (status = 401, description = "Missing or invalid user id"),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "runs"
)]
pub async fn run_session(
    State(state): State<AppState>,
    user: ActingUser,
    Path(session_id): Path<Uuid>,
    Query(params): Query<RunParams>,
    Json(req): Json<CreateRunRequest>,
) -> Result<Response, ApiError> {
    let target = params.target()?;
    let running = state
        .run_service
        .start(user.id, session_id, target, req)
        .await?;

    Ok(ndjson_response(running))
}

/// Stream a started pipeline as a chunked NDJSON response
///
/// Dropping the response body drops the event receiver, which the pipeline
/// observes as a client disconnect.
pub fn ndjson_response(running: RunningPipeline) -> Response {
    let RunningPipeline {
        run_id,
        events,
        handle,
    } = running;

    tokio::spawn(async move {
        match handle.await {
            Ok(outcome) => tracing::info!(
                run_id = %outcome.run_id,
                status = %outcome.status,
                disconnected = outcome.disconnected,
                "Run finished"
            ),
            Err(e) => tracing::error!(run_id = %run_id, "Run task failed: {}", e),
        }
    });

    let body = Body::from_stream(events.map(|event| Ok::<_, Infallible>(event.to_ndjson())));
    let headers = [
        (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE.to_string()),
        (header::CACHE_CONTROL, "no-cache".to_string()),
        (HeaderName::from_static(ACCEL_BUFFERING_HEADER), "no".to_string()),
        (HeaderName::from_static(RUN_ID_HEADER), run_id.to_string()),
    ];

    (StatusCode::OK, headers, body).into_response()
}
