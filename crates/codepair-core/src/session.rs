// Session domain types
//
// A session belongs to one user and owns the coder and explainer model
// configurations used for every run started in it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::catalog::CatalogModel;
use crate::role::Role;

/// Default run mode of a session
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Coder then explainer
    #[default]
    Pipeline,
    /// Explainer only
    ExplainerOnly,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Pipeline => write!(f, "pipeline"),
            RunMode::ExplainerOnly => write!(f, "explainer_only"),
        }
    }
}

impl From<&str> for RunMode {
    fn from(s: &str) -> Self {
        match s {
            "explainer_only" => RunMode::ExplainerOnly,
            _ => RunMode::Pipeline,
        }
    }
}

/// Session entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub run_mode: RunMode,
    pub is_archived: bool,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Session with its model configurations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: Session,
    pub model_configs: Vec<ModelConfig>,
}

/// Per-role model configuration of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ModelConfig {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
    /// Catalog model this configuration points at
    pub model: CatalogModel,
    pub temperature: f32,
    pub system_prompt: String,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelConfig {
    pub fn new(
        session_id: Uuid,
        role: Role,
        model: CatalogModel,
        temperature: f32,
        system_prompt: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            session_id,
            role,
            model,
            temperature,
            system_prompt: system_prompt.into(),
            is_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.is_enabled = false;
        self
    }
}
