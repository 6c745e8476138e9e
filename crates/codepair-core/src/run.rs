// Run domain types
//
// A run is one submitted prompt; each completed phase leaves an immutable
// RunResult behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::role::Role;

/// Overall status of a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Success,
    Error,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Pending)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Success => write!(f, "success"),
            RunStatus::Error => write!(f, "error"),
        }
    }
}

impl From<&str> for RunStatus {
    fn from(s: &str) -> Self {
        match s {
            "success" => RunStatus::Success,
            "error" => RunStatus::Error,
            _ => RunStatus::Pending,
        }
    }
}

/// Status of a single phase result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum RunResultStatus {
    Success,
    Error,
}

impl std::fmt::Display for RunResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunResultStatus::Success => write!(f, "success"),
            RunResultStatus::Error => write!(f, "error"),
        }
    }
}

impl From<&str> for RunResultStatus {
    fn from(s: &str) -> Self {
        match s {
            "success" => RunResultStatus::Success,
            _ => RunResultStatus::Error,
        }
    }
}

/// Run entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Run {
    pub id: Uuid,
    pub session_id: Uuid,
    pub prompt: String,
    pub initiator_role: Role,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
}

impl Run {
    /// New pending run
    pub fn new(session_id: Uuid, prompt: impl Into<String>, initiator_role: Role) -> Self {
        Self {
            id: Uuid::now_v7(),
            session_id,
            prompt: prompt.into(),
            initiator_role,
            status: RunStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Persisted outcome of one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RunResult {
    pub id: Uuid,
    pub run_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_config_id: Option<Uuid>,
    pub role: Role,
    pub output: String,
    pub status: RunResultStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for persisting a phase result
#[derive(Debug, Clone)]
pub struct NewRunResult {
    pub run_id: Uuid,
    pub model_config_id: Option<Uuid>,
    pub role: Role,
    pub output: String,
    pub status: RunResultStatus,
}

/// Run together with its phase results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RunWithResults {
    #[serde(flatten)]
    pub run: Run,
    pub results: Vec<RunResult>,
}

/// One remembered exchange: the user prompt of a past run and what a role
/// answered to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub run_id: Uuid,
    pub prompt: String,
    pub output: String,
}
