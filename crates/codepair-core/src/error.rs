// Error types for the coder/explainer pipeline

use thiserror::Error;

use crate::events::SYSTEM_ERROR_MESSAGE;
use crate::role::Role;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while preparing or running the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required role has no enabled model configuration
    #[error("No enabled {0} model configuration for this session")]
    ConfigurationMissing(Role),

    /// The model runtime could not be reached or rejected the request
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Malformed inbound request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid process configuration (environment, settings)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(String),

    /// No driver registered for the requested provider
    #[error("No driver registered for provider: {0}")]
    DriverNotRegistered(String),

    /// Exercise content lookup failure
    #[error("Exercise content error: {0}")]
    Content(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    /// Create a model-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        PipelineError::ModelUnavailable(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        PipelineError::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        PipelineError::Store(msg.into())
    }

    /// Create a driver-not-registered error
    pub fn driver_not_registered(provider: impl Into<String>) -> Self {
        PipelineError::DriverNotRegistered(provider.into())
    }

    /// Create an exercise content error
    pub fn content(msg: impl Into<String>) -> Self {
        PipelineError::Content(msg.into())
    }

    /// Text safe to put on a run stream
    ///
    /// Missing configuration, runtime and validation failures are shown as
    /// is. Store, driver and internal failures are reduced to a fixed message.
    pub fn client_message(&self) -> String {
        match self {
            PipelineError::ConfigurationMissing(_)
            | PipelineError::ModelUnavailable(_)
            | PipelineError::Validation(_) => self.to_string(),
            PipelineError::Configuration(_)
            | PipelineError::Store(_)
            | PipelineError::DriverNotRegistered(_)
            | PipelineError::Content(_)
            | PipelineError::Internal(_) => SYSTEM_ERROR_MESSAGE.to_string(),
        }
    }
}
