// Database models (internal, may differ from public DTOs)

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use codepair_core::{
    CatalogModel, ModelConfig, Provider, Role, Run, RunMode, RunResult, RunResultStatus,
    RunStatus, Session, Turn,
};

// ============================================
// Catalog models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct CatalogModelRow {
    pub id: Uuid,
    pub provider: String,
    pub model_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCatalogModel {
    pub provider: Provider,
    pub model_name: String,
}

// ============================================
// Session models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub run_mode: String,
    pub is_archived: bool,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateSession {
    pub user_id: Uuid,
    pub title: String,
    pub run_mode: RunMode,
    /// Initial per-role configurations, created in the same transaction
    pub model_configs: Vec<CreateModelConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSession {
    pub title: Option<String>,
    pub run_mode: Option<RunMode>,
    pub is_archived: Option<bool>,
}

// ============================================
// Model config models
// ============================================

/// Model config joined with its catalog model
#[derive(Debug, Clone, FromRow)]
pub struct ModelConfigRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: String,
    pub temperature: f32,
    pub system_prompt: String,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub catalog_model_id: Uuid,
    pub provider: String,
    pub model_name: String,
    pub model_is_active: bool,
    pub model_created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateModelConfig {
    pub role: Role,
    pub catalog_model_id: Uuid,
    pub temperature: f32,
    pub system_prompt: String,
    pub is_enabled: bool,
}

// ============================================
// Run models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct RunRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub prompt: String,
    pub initiator_role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateRun {
    pub session_id: Uuid,
    pub prompt: String,
    pub initiator_role: Role,
}

#[derive(Debug, Clone, FromRow)]
pub struct RunResultRow {
    pub id: Uuid,
    pub run_id: Uuid,
    pub model_config_id: Option<Uuid>,
    pub role: String,
    pub output: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A past prompt with one role's successful output
#[derive(Debug, Clone, FromRow)]
pub struct TurnRow {
    pub run_id: Uuid,
    pub prompt: String,
    pub output: String,
}

// ============================================
// Conversions into core domain types
// ============================================

fn parse_role(value: &str) -> anyhow::Result<Role> {
    value
        .parse()
        .map_err(|_| anyhow!("invalid role in database: {}", value))
}

fn parse_provider(value: &str) -> anyhow::Result<Provider> {
    value
        .parse()
        .map_err(|e: String| anyhow!("invalid provider in database: {}", e))
}

impl TryFrom<CatalogModelRow> for CatalogModel {
    type Error = anyhow::Error;

    fn try_from(row: CatalogModelRow) -> anyhow::Result<Self> {
        Ok(CatalogModel {
            id: row.id,
            provider: parse_provider(&row.provider)?,
            model_name: row.model_name,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            run_mode: RunMode::from(row.run_mode.as_str()),
            is_archived: row.is_archived,
            last_activity_at: row.last_activity_at,
            created_at: row.created_at,
        }
    }
}

impl TryFrom<ModelConfigRow> for ModelConfig {
    type Error = anyhow::Error;

    fn try_from(row: ModelConfigRow) -> anyhow::Result<Self> {
        Ok(ModelConfig {
            id: row.id,
            session_id: row.session_id,
            role: parse_role(&row.role)?,
            model: CatalogModel {
                id: row.catalog_model_id,
                provider: parse_provider(&row.provider)?,
                model_name: row.model_name,
                is_active: row.model_is_active,
                created_at: row.model_created_at,
            },
            temperature: row.temperature,
            system_prompt: row.system_prompt,
            is_enabled: row.is_enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<RunRow> for Run {
    type Error = anyhow::Error;

    fn try_from(row: RunRow) -> anyhow::Result<Self> {
        Ok(Run {
            id: row.id,
            session_id: row.session_id,
            prompt: row.prompt,
            initiator_role: parse_role(&row.initiator_role)?,
            status: RunStatus::from(row.status.as_str()),
            created_at: row.created_at,
        })
    }
}

impl TryFrom<RunResultRow> for RunResult {
    type Error = anyhow::Error;

    fn try_from(row: RunResultRow) -> anyhow::Result<Self> {
        Ok(RunResult {
            id: row.id,
            run_id: row.run_id,
            model_config_id: row.model_config_id,
            role: parse_role(&row.role)?,
            output: row.output,
            status: RunResultStatus::from(row.status.as_str()),
            created_at: row.created_at,
        })
    }
}

impl From<TurnRow> for Turn {
    fn from(row: TurnRow) -> Self {
        Turn {
            run_id: row.run_id,
            prompt: row.prompt,
            output: row.output,
        }
    }
}
