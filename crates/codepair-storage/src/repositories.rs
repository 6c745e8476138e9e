// Repository layer for database operations
// Catalog / Session / ModelConfig / Run / RunResult model

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use codepair_core::{Role, RunResultStatus, RunStatus};

use crate::models::*;

/// Model config columns joined with their catalog model (`mc` + `cm` aliases)
const MODEL_CONFIG_SELECT: &str = r#"
    SELECT mc.id, mc.session_id, mc.role, mc.temperature, mc.system_prompt, mc.is_enabled,
           mc.created_at, mc.updated_at,
           cm.id AS catalog_model_id, cm.provider, cm.model_name,
           cm.is_active AS model_is_active, cm.created_at AS model_created_at
    FROM model_configs mc
    JOIN catalog_models cm ON cm.id = mc.catalog_model_id
"#;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ============================================
    // Catalog models
    // ============================================

    pub async fn create_catalog_model(&self, input: CreateCatalogModel) -> Result<CatalogModelRow> {
        let row = sqlx::query_as::<_, CatalogModelRow>(
            r#"
            INSERT INTO catalog_models (id, provider, model_name, is_active)
            VALUES ($1, $2, $3, TRUE)
            RETURNING id, provider, model_name, is_active, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.provider.to_string())
        .bind(input.model_name.trim())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_catalog_model(&self, id: Uuid) -> Result<Option<CatalogModelRow>> {
        let row = sqlx::query_as::<_, CatalogModelRow>(
            r#"
            SELECT id, provider, model_name, is_active, created_at
            FROM catalog_models
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_catalog_models(&self) -> Result<Vec<CatalogModelRow>> {
        let rows = sqlx::query_as::<_, CatalogModelRow>(
            r#"
            SELECT id, provider, model_name, is_active, created_at
            FROM catalog_models
            WHERE is_active = TRUE
            ORDER BY provider, model_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ============================================
    // Sessions
    // ============================================

    /// Create a session and its initial model configs atomically
    pub async fn create_session(
        &self,
        input: CreateSession,
    ) -> Result<(SessionRow, Vec<ModelConfigRow>)> {
        let mut tx = self.pool.begin().await?;

        let session = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO sessions (id, user_id, title, run_mode)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, title, run_mode, is_archived, last_activity_at, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.user_id)
        .bind(&input.title)
        .bind(input.run_mode.to_string())
        .fetch_one(&mut *tx)
        .await?;

        let mut configs = Vec::with_capacity(input.model_configs.len());
        for config in &input.model_configs {
            let id = Uuid::now_v7();
            sqlx::query(
                r#"
                INSERT INTO model_configs
                    (id, session_id, role, catalog_model_id, temperature, system_prompt, is_enabled)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(id)
            .bind(session.id)
            .bind(config.role.as_str())
            .bind(config.catalog_model_id)
            .bind(config.temperature)
            .bind(&config.system_prompt)
            .bind(config.is_enabled)
            .execute(&mut *tx)
            .await?;

            let row = sqlx::query_as::<_, ModelConfigRow>(&format!("{MODEL_CONFIG_SELECT} WHERE mc.id = $1"))
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            configs.push(row);
        }

        tx.commit().await?;
        Ok((session, configs))
    }

    /// Non-archived sessions of a user, most recently active first
    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<SessionRow>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, title, run_mode, is_archived, last_activity_at, created_at
            FROM sessions
            WHERE user_id = $1 AND is_archived = FALSE
            ORDER BY last_activity_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_session(&self, user_id: Uuid, id: Uuid) -> Result<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, title, run_mode, is_archived, last_activity_at, created_at
            FROM sessions
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_session(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: UpdateSession,
    ) -> Result<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE sessions
            SET
                title = COALESCE($3, title),
                run_mode = COALESCE($4, run_mode),
                is_archived = COALESCE($5, is_archived)
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, title, run_mode, is_archived, last_activity_at, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(input.title)
        .bind(input.run_mode.map(|m| m.to_string()))
        .bind(input.is_archived)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Hard delete; configs, runs and results cascade
    pub async fn delete_session(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn touch_session(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET last_activity_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ============================================
    // Model configs
    // ============================================

    pub async fn list_model_configs(&self, session_id: Uuid) -> Result<Vec<ModelConfigRow>> {
        let rows = sqlx::query_as::<_, ModelConfigRow>(&format!(
            "{MODEL_CONFIG_SELECT} WHERE mc.session_id = $1 ORDER BY mc.role, mc.created_at"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_enabled_model_config(
        &self,
        session_id: Uuid,
        role: Role,
    ) -> Result<Option<ModelConfigRow>> {
        let row = sqlx::query_as::<_, ModelConfigRow>(&format!(
            "{MODEL_CONFIG_SELECT} WHERE mc.session_id = $1 AND mc.role = $2 AND mc.is_enabled"
        ))
        .bind(session_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Replace the configuration of a role
    ///
    /// The most recent config of the role is updated in place, or a new one is
    /// inserted. Enabling it disables every other config of the role.
    pub async fn upsert_model_config(
        &self,
        session_id: Uuid,
        input: CreateModelConfig,
    ) -> Result<ModelConfigRow> {
        let mut tx = self.pool.begin().await?;
        let role = input.role.as_str();

        let existing: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM model_configs
            WHERE session_id = $1 AND role = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .bind(role)
        .fetch_optional(&mut *tx)
        .await?;

        if input.is_enabled {
            sqlx::query(
                r#"
                UPDATE model_configs
                SET is_enabled = FALSE, updated_at = NOW()
                WHERE session_id = $1 AND role = $2 AND is_enabled
                  AND ($3::uuid IS NULL OR id <> $3)
                "#,
            )
            .bind(session_id)
            .bind(role)
            .bind(existing)
            .execute(&mut *tx)
            .await?;
        }

        let id = match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE model_configs
                    SET catalog_model_id = $2, temperature = $3, system_prompt = $4,
                        is_enabled = $5, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(input.catalog_model_id)
                .bind(input.temperature)
                .bind(&input.system_prompt)
                .bind(input.is_enabled)
                .execute(&mut *tx)
                .await?;
                id
            }
            None => {
                let id = Uuid::now_v7();
                sqlx::query(
                    r#"
                    INSERT INTO model_configs
                        (id, session_id, role, catalog_model_id, temperature, system_prompt, is_enabled)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(id)
                .bind(session_id)
                .bind(role)
                .bind(input.catalog_model_id)
                .bind(input.temperature)
                .bind(&input.system_prompt)
                .bind(input.is_enabled)
                .execute(&mut *tx)
                .await?;
                id
            }
        };

        let row = sqlx::query_as::<_, ModelConfigRow>(&format!("{MODEL_CONFIG_SELECT} WHERE mc.id = $1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    // ============================================
    // Runs
    // ============================================

    pub async fn create_run(&self, input: CreateRun) -> Result<RunRow> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            INSERT INTO runs (id, session_id, prompt, initiator_role, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING id, session_id, prompt, initiator_role, status, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.session_id)
        .bind(&input.prompt)
        .bind(input.initiator_role.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Move a pending run to a terminal status; false if it was not pending
    pub async fn finish_run(&self, id: Uuid, status: RunStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Most recent runs of a session with their results, newest first
    pub async fn list_runs_with_results(
        &self,
        session_id: Uuid,
        limit: i64,
    ) -> Result<Vec<(RunRow, Vec<RunResultRow>)>> {
        let runs = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, session_id, prompt, initiator_role, status, created_at
            FROM runs
            WHERE session_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let run_ids: Vec<Uuid> = runs.iter().map(|r| r.id).collect();
        let results = sqlx::query_as::<_, RunResultRow>(
            r#"
            SELECT id, run_id, model_config_id, role, output, status, created_at
            FROM run_results
            WHERE run_id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(&run_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(runs
            .into_iter()
            .map(|run| {
                let own = results
                    .iter()
                    .filter(|r| r.run_id == run.id)
                    .cloned()
                    .collect();
                (run, own)
            })
            .collect())
    }

    // ============================================
    // Run results
    // ============================================

    pub async fn create_run_result(
        &self,
        run_id: Uuid,
        model_config_id: Option<Uuid>,
        role: Role,
        output: &str,
        status: RunResultStatus,
    ) -> Result<RunResultRow> {
        let row = sqlx::query_as::<_, RunResultRow>(
            r#"
            INSERT INTO run_results (id, run_id, model_config_id, role, output, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, run_id, model_config_id, role, output, status, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(run_id)
        .bind(model_config_id)
        .bind(role.as_str())
        .bind(output)
        .bind(status.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Past prompts of a session paired with a role's successful output
    ///
    /// Newest first. Pending runs and `exclude_run_id` are skipped.
    pub async fn recent_turns(
        &self,
        session_id: Uuid,
        role: Role,
        exclude_run_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TurnRow>> {
        let rows = sqlx::query_as::<_, TurnRow>(
            r#"
            SELECT r.id AS run_id, r.prompt, rr.output
            FROM runs r
            JOIN LATERAL (
                SELECT output
                FROM run_results
                WHERE run_id = r.id AND role = $2 AND status = 'success'
                ORDER BY created_at DESC
                LIMIT 1
            ) rr ON TRUE
            WHERE r.session_id = $1
              AND r.id <> $3
              AND r.status <> 'pending'
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT $4
            "#,
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(exclude_run_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Whether an error came from a unique constraint violation
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}
