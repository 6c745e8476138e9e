// Services layer for business logic
// Services own business logic and validation, calling storage directly

pub mod catalog;
pub mod run;
pub mod session;

pub use catalog::CatalogService;
pub use run::RunService;
pub use session::SessionService;

/// Failure of a service operation, mapped to an HTTP status by the routes
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<codepair_core::PipelineError> for ServiceError {
    fn from(err: codepair_core::PipelineError) -> Self {
        match err {
            codepair_core::PipelineError::Validation(message) => Self::Validation(message),
            other => Self::Internal(other.into()),
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
