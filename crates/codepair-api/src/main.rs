// Codepair API server
// Decision: The acting user comes from the X-User-Id header set by an upstream gate
// Decision: Runs stream NDJSON from the in-process pipeline; no worker or queue sits in between

mod auth;
mod catalog;
mod common;
mod config;
mod exercises;
mod runs;
mod services;
mod sessions;

use anyhow::{Context, Result};
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::{extract::State, routing::get, Json, Router};
use codepair_core::{
    CatalogModel, DriverRegistry, Exercise, ExerciseCatalog, ExerciseSummary, LanguageSummary,
    ModelConfig, PipelineSettings, Provider, Role, Run, RunMode, RunPipeline, RunResult,
    RunResultStatus, RunStatus, RunWithResults, Session, SessionDetail,
};
use codepair_storage::{create_db_pipeline_store, Database};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::common::{ErrorResponse, ListResponse};
use crate::config::ServerConfig;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    ollama_url: String,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ollama_url: state.ollama_url.clone(),
    })
}

/// State for health endpoint
#[derive(Clone)]
struct HealthState {
    ollama_url: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        sessions::create_session,
        sessions::list_sessions,
        sessions::get_session,
        sessions::update_session,
        sessions::delete_session,
        sessions::put_model_config,
        sessions::list_runs,
        runs::run_session,
        catalog::list_models,
        catalog::create_model,
        exercises::list_languages,
        exercises::list_exercises,
        exercises::get_exercise,
    ),
    components(
        schemas(
            Session, SessionDetail, RunMode, ModelConfig, Role,
            CatalogModel, Provider,
            Run, RunStatus, RunResult, RunResultStatus, RunWithResults,
            Exercise, ExerciseSummary, LanguageSummary,
            ErrorResponse,
            sessions::CreateSessionRequest,
            sessions::UpdateSessionRequest,
            sessions::ModelConfigRequest,
            sessions::SessionModelConfigRequest,
            runs::CreateRunRequest,
            catalog::CreateCatalogModelRequest,
            ListResponse<Session>,
            ListResponse<RunWithResults>,
            ListResponse<CatalogModel>,
            ListResponse<LanguageSummary>,
            ListResponse<ExerciseSummary>,
        )
    ),
    tags(
        (name = "sessions", description = "Session and model config management endpoints"),
        (name = "runs", description = "Run submission (NDJSON streaming) and history endpoints"),
        (name = "models", description = "Model catalog endpoints"),
        (name = "learn", description = "Exercise content endpoints")
    ),
    info(
        title = "Codepair API",
        version = "0.1.0",
        description = "Coder and explainer agents streaming answers for developers",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "codepair_api=debug,codepair_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("codepair-api starting...");

    let config = ServerConfig::from_env()?;
    let settings = PipelineSettings::from_env().context("Invalid pipeline settings")?;
    tracing::info!(
        ollama_url = %settings.ollama_url,
        context_window = settings.context_window,
        history_window = settings.history_window,
        "Pipeline configured"
    );

    // Initialize database
    let db = Database::from_url(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await?;
    tracing::info!("Connected to database");

    // Exercise content is optional; without it the learn endpoints list nothing
    let exercise_catalog = match &config.exercises_path {
        Some(path) => {
            let catalog = ExerciseCatalog::load(path).context("Failed to load exercise content")?;
            tracing::info!(path = %path.display(), languages = catalog.languages().len(), "Exercise content loaded");
            catalog
        }
        None => {
            tracing::info!("EXERCISES_PATH not set, exercise content disabled");
            ExerciseCatalog::empty()
        }
    };

    // Model runtime drivers
    let mut registry = DriverRegistry::new();
    codepair_ollama::register_driver(&mut registry).context("Failed to set up Ollama driver")?;

    let pipeline = RunPipeline::new(
        create_db_pipeline_store(db.clone()),
        Arc::new(registry),
        settings.clone(),
    );

    // Create module-specific states
    let db = Arc::new(db);
    let sessions_state = sessions::AppState::new(db.clone());
    let runs_state = runs::AppState::new(db.clone(), pipeline);
    let catalog_state = catalog::AppState::new(db.clone());
    let exercises_state = exercises::AppState::new(Arc::new(exercise_catalog));
    let health_state = HealthState {
        ollama_url: settings.ollama_url.clone(),
    };

    if !config.api_prefix.is_empty() {
        tracing::info!(prefix = %config.api_prefix, "API prefix configured");
    }

    let cors_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
    }

    let api_routes = Router::new()
        .merge(sessions::routes(sessions_state))
        .merge(runs::routes(runs_state))
        .merge(catalog::routes(catalog_state))
        .merge(exercises::routes(exercises_state));

    // Build main router with health (not prefixed) and prefixed API routes
    let app = Router::new()
        .route("/health", get(health).with_state(health_state))
        .merge(build_router_with_prefix(api_routes, &config.api_prefix))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    // Add CORS layer only if origins are configured
    let app = if !cors_origins.is_empty() {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    header::ORIGIN,
                    header::CACHE_CONTROL,
                    HeaderName::from_static(auth::USER_ID_HEADER),
                ])
                .expose_headers([HeaderName::from_static(runs::RUN_ID_HEADER)]),
        )
    } else {
        app
    };

    // Add tracing
    let app = app.layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Build router with optional API prefix (extracted for testing)
fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}
