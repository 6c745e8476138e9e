// Exercise content HTTP routes (read-only)

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use codepair_core::{Exercise, ExerciseCatalog, ExerciseSummary, LanguageSummary};
use std::sync::Arc;

use crate::common::{not_found, ApiError, ErrorResponse, ListResponse};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<ExerciseCatalog>,
}

impl AppState {
    pub fn new(catalog: Arc<ExerciseCatalog>) -> Self {
        Self { catalog }
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/learn/languages", get(list_languages))
        .route("/v1/learn/languages/:slug/exercises", get(list_exercises))
        .route(
            "/v1/learn/languages/:slug/exercises/:exercise_id",
            get(get_exercise),
        )
        .with_state(state)
}

/// GET /v1/learn/languages - Languages with practice content
#[utoipa::path(
    get,
    path = "/v1/learn/languages",
    responses(
        (status = 200, description = "Available languages", body = ListResponse<LanguageSummary>)
    ),
    tag = "learn"
)]
pub async fn list_languages(State(state): State<AppState>) -> Json<ListResponse<LanguageSummary>> {
    Json(ListResponse::new(state.catalog.languages()))
}

/// GET /v1/learn/languages/{slug}/exercises - Exercises of a language
#[utoipa::path(
    get,
    path = "/v1/learn/languages/{slug}/exercises",
    params(
        ("slug" = String, Path, description = "Language slug")
    ),
    responses(
        (status = 200, description = "Exercises of the language", body = ListResponse<ExerciseSummary>),
        (status = 404, description = "Language not found", body = ErrorResponse)
    ),
    tag = "learn"
)]
pub async fn list_exercises(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ListResponse<ExerciseSummary>>, ApiError> {
    let exercises = state
        .catalog
        .exercises(&slug)
        .ok_or_else(|| not_found("Language"))?;
    Ok(Json(ListResponse::new(exercises)))
}

/// GET /v1/learn/languages/{slug}/exercises/{exercise_id} - Exercise detail
#[utoipa::path(
    get,
    path = "/v1/learn/languages/{slug}/exercises/{exercise_id}",
    params(
        ("slug" = String, Path, description = "Language slug"),
        ("exercise_id" = String, Path, description = "Exercise ID")
    ),
    responses(
        (status = 200, description = "Exercise found", body = Exercise),
        (status = 404, description = "Language or exercise not found", body = ErrorResponse)
    ),
    tag = "learn"
)]
pub async fn get_exercise(
    State(state): State<AppState>,
    Path((slug, exercise_id)): Path<(String, String)>,
) -> Result<Json<Exercise>, ApiError> {
    if state.catalog.language(&slug).is_none() {
        return Err(not_found("Language"));
    }
    let exercise = state
        .catalog
        .exercise(&slug, &exercise_id)
        .ok_or_else(|| not_found("Exercise"))?;
    Ok(Json(exercise.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    const CONTENT: &str = r#"{
        "languages": [
            {
                "slug": "python",
                "name": "Python",
                "version": "3.12",
                "description": "Scripting",
                "exercises": [
                    {
                        "id": "reverse-string",
                        "title": "Reverse a string",
                        "difficulty": "easy",
                        "prompt": "Return the string reversed",
                        "starter_code": "def reverse(s):\n    pass\n",
                        "hints": ["slices take a step"],
                        "expected_code": "def reverse(s):\n    return s[::-1]\n"
                    },
                    { "id": "fizzbuzz", "title": "FizzBuzz", "difficulty": "easy" }
                ]
            }
        ]
    }"#;

    fn app() -> Router {
        let catalog = ExerciseCatalog::from_json_str(CONTENT).unwrap();
        routes(AppState::new(Arc::new(catalog)))
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_list_languages() {
        let (status, body) = get_json("/v1/learn/languages").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["slug"], "python");
        assert_eq!(body["data"][0]["version"], "3.12");
    }

    #[tokio::test]
    async fn test_list_exercises_has_summary_shape() {
        let (status, body) = get_json("/v1/learn/languages/python/exercises").await;
        assert_eq!(status, StatusCode::OK);

        let exercises = body["data"].as_array().unwrap();
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0]["id"], "reverse-string");
        assert!(exercises[0].get("prompt").is_none());
    }

    #[tokio::test]
    async fn test_exercise_detail_hides_solution() {
        let (status, body) = get_json("/v1/learn/languages/python/exercises/reverse-string").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Reverse a string");
        assert_eq!(body["hints"][0], "slices take a step");
        assert!(body.get("expected_code").is_none());
    }

    #[tokio::test]
    async fn test_unknown_language_and_exercise() {
        let (status, body) = get_json("/v1/learn/languages/cobol/exercises").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Language not found");

        let (status, body) = get_json("/v1/learn/languages/python/exercises/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Exercise not found");
    }
}
