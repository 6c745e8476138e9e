// Common DTOs for public API
//
// These types are shared across multiple API endpoints.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::ServiceError;

/// Response wrapper for list endpoints.
/// All list endpoints return responses wrapped in a `data` field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListResponse<T> {
    /// Array of items returned by the list operation.
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

/// Error body returned by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Prompt is required")]
    pub error: String,
}

/// Handler error: status plus JSON body
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn not_found(what: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("{} not found", what))
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => not_found(&what),
            ServiceError::Validation(message) => api_error(StatusCode::BAD_REQUEST, message),
            ServiceError::Conflict(message) => api_error(StatusCode::CONFLICT, message),
            ServiceError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_status_mapping() {
        let (status, Json(body)) = ApiError::from(ServiceError::NotFound("Session".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Session not found");

        let (status, _) = ApiError::from(ServiceError::Validation("bad".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = ApiError::from(ServiceError::Conflict("dup".into()));
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_error_hides_details() {
        let err = ServiceError::Internal(anyhow::anyhow!("connection refused"));
        let (status, Json(body)) = ApiError::from(err);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
    }

    #[test]
    fn test_list_response_serializes_data_field() {
        let list = ListResponse::new(vec![1, 2]);
        assert_eq!(serde_json::to_string(&list).unwrap(), r#"{"data":[1,2]}"#);
    }
}
