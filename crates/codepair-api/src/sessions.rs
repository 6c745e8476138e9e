// Session and model config HTTP routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use codepair_core::{ModelConfig, Role, RunMode, RunWithResults, Session, SessionDetail};
use codepair_storage::Database;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::ActingUser;
use crate::common::{api_error, ApiError, ErrorResponse, ListResponse};
use crate::services::SessionService;

pub const DEFAULT_RUN_LIST_LIMIT: i64 = 20;
pub const MAX_RUN_LIST_LIMIT: i64 = 100;

fn default_temperature() -> f32 {
    0.7
}

fn default_enabled() -> bool {
    true
}

/// Model settings for one role of a session
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ModelConfigRequest {
    /// Catalog model to use.
    pub catalog_model_id: Uuid,
    /// Sampling temperature, 0 to 2.
    #[serde(default = "default_temperature")]
    #[schema(example = 0.2)]
    pub temperature: f32,
    /// System prompt sent first in every request for this role.
    #[serde(default)]
    #[schema(example = "You are a senior Python developer. Answer with code only.")]
    pub system_prompt: String,
    /// Whether runs use this configuration.
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

/// Model settings tagged with their role, used when creating a session
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SessionModelConfigRequest {
    pub role: Role,
    #[serde(flatten)]
    pub config: ModelConfigRequest,
}

/// Request to create a session
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    /// Human-readable title for the session.
    #[serde(default)]
    #[schema(example = "Python loops")]
    pub title: Option<String>,
    /// Default run mode (pipeline when omitted).
    #[serde(default)]
    pub run_mode: Option<RunMode>,
    /// Coder and explainer configurations, created with the session.
    #[serde(default)]
    pub model_configs: Vec<SessionModelConfigRequest>,
}

/// Request to update a session. Only provided fields will be updated.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateSessionRequest {
    #[serde(default)]
    #[schema(example = "Updated session title")]
    pub title: Option<String>,
    #[serde(default)]
    pub run_mode: Option<RunMode>,
    #[serde(default)]
    pub is_archived: Option<bool>,
}

/// Query parameters for listing runs
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListRunsParams {
    /// Max number of runs (default 20, at most 100)
    pub limit: Option<i64>,
}

impl ListRunsParams {
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_RUN_LIST_LIMIT)
            .clamp(1, MAX_RUN_LIST_LIMIT)
    }
}

/// App state for sessions routes
#[derive(Clone)]
pub struct AppState {
    pub session_service: Arc<SessionService>,
}

impl AppState {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            session_service: Arc::new(SessionService::new(db)),
        }
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/sessions", get(list_sessions).post(create_session))
        .route(
            "/v1/sessions/:session_id",
            get(get_session)
                .patch(update_session)
                .delete(delete_session),
        )
        .route("/v1/sessions/:session_id/configs/:role", put(put_model_config))
        .route("/v1/sessions/:session_id/runs", get(list_runs))
        .with_state(state)
}

/// POST /v1/sessions - Create a session with its model configs
#[utoipa::path(
    post,
    path = "/v1/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created successfully", body = SessionDetail),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Missing or invalid user id"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn create_session(
    State(state): State<AppState>,
    user: ActingUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionDetail>), ApiError> {
    let session = state.session_service.create(user.id, req).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /v1/sessions - List the acting user's sessions
#[utoipa::path(
    get,
    path = "/v1/sessions",
    responses(
        (status = 200, description = "Non-archived sessions, most recently active first", body = ListResponse<Session>),
        (status = 401, description = "Missing or invalid user id"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    user: ActingUser,
) -> Result<Json<ListResponse<Session>>, ApiError> {
    let sessions = state.session_service.list(user.id).await?;
    Ok(Json(ListResponse::new(sessions)))
}

/// GET /v1/sessions/{session_id} - Session with its model configs
#[utoipa::path(
    get,
    path = "/v1/sessions/{session_id}",
    params(
        ("session_id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session found", body = SessionDetail),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    user: ActingUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionDetail>, ApiError> {
    let session = state.session_service.get(user.id, session_id).await?;
    Ok(Json(session))
}

/// PATCH /v1/sessions/{session_id} - Update title, run mode or archive flag
#[utoipa::path(
    patch,
    path = "/v1/sessions/{session_id}",
    params(
        ("session_id" = Uuid, Path, description = "Session ID")
    ),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Session updated successfully", body = Session),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn update_session(
    State(state): State<AppState>,
    user: ActingUser,
    Path(session_id): Path<Uuid>,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state
        .session_service
        .update(user.id, session_id, req)
        .await?;
    Ok(Json(session))
}

/// DELETE /v1/sessions/{session_id} - Delete a session with its configs and runs
#[utoipa::path(
    delete,
    path = "/v1/sessions/{session_id}",
    params(
        ("session_id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 204, description = "Session deleted successfully"),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    user: ActingUser,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.session_service.delete(user.id, session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/sessions/{session_id}/configs/{role} - Replace a role's model config
#[utoipa::path(
    put,
    path = "/v1/sessions/{session_id}/configs/{role}",
    params(
        ("session_id" = Uuid, Path, description = "Session ID"),
        ("role" = String, Path, description = "coder or explainer")
    ),
    request_body = ModelConfigRequest,
    responses(
        (status = 200, description = "Model config replaced", body = ModelConfig),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Concurrent update", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn put_model_config(
    State(state): State<AppState>,
    user: ActingUser,
    Path((session_id, role)): Path<(Uuid, String)>,
    Json(req): Json<ModelConfigRequest>,
) -> Result<Json<ModelConfig>, ApiError> {
    let role: Role = role
        .parse()
        .map_err(|e: codepair_core::PipelineError| {
            api_error(StatusCode::BAD_REQUEST, e.to_string())
        })?;

    let config = state
        .session_service
        .put_config(user.id, session_id, role, req)
        .await?;
    Ok(Json(config))
}

/// GET /v1/sessions/{session_id}/runs - Recent runs with their results
#[utoipa::path(
    get,
    path = "/v1/sessions/{session_id}/runs",
    params(
        ("session_id" = Uuid, Path, description = "Session ID"),
        ListRunsParams
    ),
    responses(
        (status = 200, description = "Runs, newest first", body = ListResponse<RunWithResults>),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "runs"
)]
pub async fn list_runs(
    State(state): State<AppState>,
    user: ActingUser,
    Path(session_id): Path<Uuid>,
    Query(params): Query<ListRunsParams>,
) -> Result<Json<ListResponse<RunWithResults>>, ApiError> {
    let runs = state
        .session_service
        .list_runs(user.id, session_id, params.limit())
        .await?;
    Ok(Json(ListResponse::new(runs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_session_request_minimal() {
        let req: CreateSessionRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.title, None);
        assert_eq!(req.run_mode, None);
        assert!(req.model_configs.is_empty());
    }

    #[test]
    fn test_create_session_request_full() {
        let coder_model = Uuid::now_v7();
        let json = format!(
            r#"{{
                "title": "Loops",
                "run_mode": "explainer_only",
                "model_configs": [
                    {{"role": "coder", "catalog_model_id": "{coder_model}", "temperature": 0.1, "system_prompt": "Code only."}},
                    {{"role": "explainer", "catalog_model_id": "{coder_model}", "is_enabled": false}}
                ]
            }}"#
        );
        let req: CreateSessionRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(req.run_mode, Some(RunMode::ExplainerOnly));
        assert_eq!(req.model_configs.len(), 2);

        let coder = &req.model_configs[0];
        assert_eq!(coder.role, Role::Coder);
        assert_eq!(coder.config.catalog_model_id, coder_model);
        assert_eq!(coder.config.temperature, 0.1);
        assert!(coder.config.is_enabled);

        let explainer = &req.model_configs[1];
        assert_eq!(explainer.config.temperature, default_temperature());
        assert_eq!(explainer.config.system_prompt, "");
        assert!(!explainer.config.is_enabled);
    }

    #[test]
    fn test_create_session_request_rejects_unknown_role() {
        let json = format!(
            r#"{{"model_configs": [{{"role": "reviewer", "catalog_model_id": "{}"}}]}}"#,
            Uuid::now_v7()
        );
        assert!(serde_json::from_str::<CreateSessionRequest>(&json).is_err());
    }

    #[test]
    fn test_update_session_request_partial() {
        let req: UpdateSessionRequest = serde_json::from_str(r#"{"is_archived": true}"#).unwrap();
        assert_eq!(req.title, None);
        assert_eq!(req.run_mode, None);
        assert_eq!(req.is_archived, Some(true));
    }

    #[test]
    fn test_run_list_limit_is_clamped() {
        assert_eq!(ListRunsParams { limit: None }.limit(), DEFAULT_RUN_LIST_LIMIT);
        assert_eq!(ListRunsParams { limit: Some(0) }.limit(), 1);
        assert_eq!(ListRunsParams { limit: Some(500) }.limit(), MAX_RUN_LIST_LIMIT);
        assert_eq!(ListRunsParams { limit: Some(7) }.limit(), 7);
    }
}
