// Model catalog HTTP routes

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use codepair_core::{CatalogModel, Provider};
use codepair_storage::Database;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::common::{ApiError, ErrorResponse, ListResponse};
use crate::services::CatalogService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CatalogService>,
}

impl AppState {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            service: Arc::new(CatalogService::new(db)),
        }
    }
}

/// Request to register a model in the catalog
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCatalogModelRequest {
    pub provider: Provider,
    /// Model name as known to the runtime.
    #[schema(example = "qwen2.5-coder:7b")]
    pub model_name: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/models", get(list_models).post(create_model))
        .with_state(state)
}

/// GET /v1/models - List active catalog models
#[utoipa::path(
    get,
    path = "/v1/models",
    responses(
        (status = 200, description = "Active catalog models", body = ListResponse<CatalogModel>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "models"
)]
pub async fn list_models(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<CatalogModel>>, ApiError> {
    let models = state.service.list().await?;
    Ok(Json(ListResponse::new(models)))
}

/// POST /v1/models - Register a catalog model
#[utoipa::path(
    post,
    path = "/v1/models",
    request_body = CreateCatalogModelRequest,
    responses(
        (status = 201, description = "Model registered", body = CatalogModel),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Model already registered for this provider", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "models"
)]
pub async fn create_model(
    State(state): State<AppState>,
    Json(req): Json<CreateCatalogModelRequest>,
) -> Result<(StatusCode, Json<CatalogModel>), ApiError> {
    let model = state.service.create(req).await?;
    Ok((StatusCode::CREATED, Json(model)))
}
