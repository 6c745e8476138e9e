// Session service for business logic
//
// Sessions are always scoped to the acting user: a session owned by someone
// else is reported as not found.

use anyhow::Context;
use codepair_core::{ModelConfig, Role, Run, RunResult, RunWithResults, Session, SessionDetail};
use codepair_storage::{
    is_unique_violation, CreateModelConfig, CreateSession, Database, UpdateSession,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::sessions::{
    CreateSessionRequest, ModelConfigRequest, SessionModelConfigRequest, UpdateSessionRequest,
};

pub const DEFAULT_SESSION_TITLE: &str = "New session";
pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_TEMPERATURE: f32 = 2.0;

pub struct SessionService {
    db: Arc<Database>,
}

impl SessionService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        req: CreateSessionRequest,
    ) -> ServiceResult<SessionDetail> {
        let title = normalize_title(req.title.as_deref())?;
        validate_session_configs(&req.model_configs)?;

        let mut model_configs = Vec::with_capacity(req.model_configs.len());
        for config in req.model_configs {
            self.ensure_catalog_model(config.config.catalog_model_id).await?;
            model_configs.push(to_create_config(config.role, config.config));
        }

        let (session, configs) = self
            .db
            .create_session(CreateSession {
                user_id,
                title,
                run_mode: req.run_mode.unwrap_or_default(),
                model_configs,
            })
            .await
            .context("Failed to create session")?;

        tracing::info!(session_id = %session.id, configs = configs.len(), "Session created");

        Ok(SessionDetail {
            session: Session::from(session),
            model_configs: configs
                .into_iter()
                .map(ModelConfig::try_from)
                .collect::<anyhow::Result<_>>()?,
        })
    }

    pub async fn list(&self, user_id: Uuid) -> ServiceResult<Vec<Session>> {
        let rows = self.db.list_sessions(user_id).await?;
        Ok(rows.into_iter().map(Session::from).collect())
    }

    /// Session of the acting user, or NotFound
    pub async fn get_owned(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Session> {
        self.db
            .get_session(user_id, id)
            .await?
            .map(Session::from)
            .ok_or_else(|| ServiceError::not_found("Session"))
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> ServiceResult<SessionDetail> {
        let session = self.get_owned(user_id, id).await?;
        let model_configs = self
            .db
            .list_model_configs(id)
            .await?
            .into_iter()
            .map(ModelConfig::try_from)
            .collect::<anyhow::Result<_>>()?;

        Ok(SessionDetail {
            session,
            model_configs,
        })
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        req: UpdateSessionRequest,
    ) -> ServiceResult<Session> {
        let title = match req.title.as_deref() {
            Some(title) => Some(normalize_title(Some(title))?),
            None => None,
        };

        let row = self
            .db
            .update_session(
                user_id,
                id,
                UpdateSession {
                    title,
                    run_mode: req.run_mode,
                    is_archived: req.is_archived,
                },
            )
            .await?
            .ok_or_else(|| ServiceError::not_found("Session"))?;

        Ok(Session::from(row))
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> ServiceResult<()> {
        if self.db.delete_session(user_id, id).await? {
            tracing::info!(session_id = %id, "Session deleted");
            Ok(())
        } else {
            Err(ServiceError::not_found("Session"))
        }
    }

    /// Replace the configuration of one role
    pub async fn put_config(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        role: Role,
        req: ModelConfigRequest,
    ) -> ServiceResult<ModelConfig> {
        validate_temperature(req.temperature)?;
        self.get_owned(user_id, session_id).await?;
        self.ensure_catalog_model(req.catalog_model_id).await?;

        let row = self
            .db
            .upsert_model_config(session_id, to_create_config(role, req))
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::Conflict(format!(
                        "Another {} configuration was enabled concurrently",
                        role
                    ))
                } else {
                    ServiceError::Internal(e)
                }
            })?;

        tracing::info!(session_id = %session_id, role = %role, "Model config replaced");
        Ok(ModelConfig::try_from(row)?)
    }

    /// Most recent runs of a session, newest first, with their results
    pub async fn list_runs(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        limit: i64,
    ) -> ServiceResult<Vec<RunWithResults>> {
        self.get_owned(user_id, session_id).await?;

        let rows = self.db.list_runs_with_results(session_id, limit).await?;
        let mut runs = Vec::with_capacity(rows.len());
        for (run, results) in rows {
            runs.push(RunWithResults {
                run: Run::try_from(run)?,
                results: results
                    .into_iter()
                    .map(RunResult::try_from)
                    .collect::<anyhow::Result<_>>()?,
            });
        }
        Ok(runs)
    }

    async fn ensure_catalog_model(&self, id: Uuid) -> ServiceResult<()> {
        match self.db.get_catalog_model(id).await? {
            Some(model) if model.is_active => Ok(()),
            Some(_) => Err(ServiceError::validation(format!(
                "Catalog model {} is not active",
                id
            ))),
            None => Err(ServiceError::validation(format!(
                "Unknown catalog model {}",
                id
            ))),
        }
    }
}

// ============================================
// Validation
// ============================================

fn normalize_title(title: Option<&str>) -> ServiceResult<String> {
    let title = title.map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Ok(DEFAULT_SESSION_TITLE.to_string());
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ServiceError::validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn validate_temperature(temperature: f32) -> ServiceResult<()> {
    if !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(ServiceError::validation(format!(
            "Temperature must be between 0 and {}",
            MAX_TEMPERATURE
        )));
    }
    Ok(())
}

fn validate_session_configs(configs: &[SessionModelConfigRequest]) -> ServiceResult<()> {
    for config in configs {
        validate_temperature(config.config.temperature)?;
    }

    for role in Role::ALL {
        let enabled = configs
            .iter()
            .filter(|c| c.role == role && c.config.is_enabled)
            .count();
        if enabled > 1 {
            return Err(ServiceError::validation(format!(
                "At most one enabled {} configuration is allowed",
                role
            )));
        }
    }
    Ok(())
}

fn to_create_config(role: Role, req: ModelConfigRequest) -> CreateModelConfig {
    CreateModelConfig {
        role,
        catalog_model_id: req.catalog_model_id,
        temperature: req.temperature,
        system_prompt: req.system_prompt,
        is_enabled: req.is_enabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(role: Role, enabled: bool, temperature: f32) -> SessionModelConfigRequest {
        SessionModelConfigRequest {
            role,
            config: ModelConfigRequest {
                catalog_model_id: Uuid::now_v7(),
                temperature,
                system_prompt: String::new(),
                is_enabled: enabled,
            },
        }
    }

    #[test]
    fn test_blank_title_gets_default() {
        assert_eq!(normalize_title(None).unwrap(), DEFAULT_SESSION_TITLE);
        assert_eq!(normalize_title(Some("   ")).unwrap(), DEFAULT_SESSION_TITLE);
        assert_eq!(normalize_title(Some(" Loops ")).unwrap(), "Loops");
    }

    #[test]
    fn test_long_title_rejected() {
        let title = "x".repeat(MAX_TITLE_LENGTH + 1);
        assert!(matches!(
            normalize_title(Some(&title)),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_temperature_range() {
        assert!(validate_temperature(0.0).is_ok());
        assert!(validate_temperature(MAX_TEMPERATURE).is_ok());
        assert!(validate_temperature(-0.1).is_err());
        assert!(validate_temperature(2.5).is_err());
        assert!(validate_temperature(f32::NAN).is_err());
    }

    #[test]
    fn test_one_enabled_config_per_role() {
        let ok = vec![
            config(Role::Coder, true, 0.2),
            config(Role::Coder, false, 0.2),
            config(Role::Explainer, true, 0.7),
        ];
        assert!(validate_session_configs(&ok).is_ok());

        let duplicate = vec![config(Role::Explainer, true, 0.7), config(Role::Explainer, true, 0.3)];
        assert!(matches!(
            validate_session_configs(&duplicate),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_configs_check_temperature() {
        let configs = vec![config(Role::Coder, true, 3.0)];
        assert!(validate_session_configs(&configs).is_err());
    }
}
