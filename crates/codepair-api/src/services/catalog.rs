// Catalog service for business logic

use codepair_core::CatalogModel;
use codepair_storage::{is_unique_violation, CreateCatalogModel, Database};
use std::sync::Arc;

use super::{ServiceError, ServiceResult};
use crate::catalog::CreateCatalogModelRequest;

pub const MAX_MODEL_NAME_LENGTH: usize = 100;

pub struct CatalogService {
    db: Arc<Database>,
}

impl CatalogService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> ServiceResult<Vec<CatalogModel>> {
        let rows = self.db.list_catalog_models().await?;
        Ok(rows
            .into_iter()
            .map(CatalogModel::try_from)
            .collect::<anyhow::Result<_>>()?)
    }

    pub async fn create(&self, req: CreateCatalogModelRequest) -> ServiceResult<CatalogModel> {
        let model_name = validate_model_name(&req.model_name)?;

        let row = self
            .db
            .create_catalog_model(CreateCatalogModel {
                provider: req.provider,
                model_name: model_name.clone(),
            })
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::Conflict(format!(
                        "Model '{}' is already registered for provider {}",
                        model_name, req.provider
                    ))
                } else {
                    ServiceError::Internal(e)
                }
            })?;

        tracing::info!(provider = %req.provider, model = %model_name, "Catalog model registered");
        Ok(CatalogModel::try_from(row)?)
    }
}

fn validate_model_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("Model name is required"));
    }
    if name.chars().count() > MAX_MODEL_NAME_LENGTH {
        return Err(ServiceError::validation(format!(
            "Model name must be at most {} characters",
            MAX_MODEL_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_is_trimmed() {
        assert_eq!(validate_model_name("  llama3:8b ").unwrap(), "llama3:8b");
    }

    #[test]
    fn test_blank_model_name_rejected() {
        assert!(matches!(
            validate_model_name("   "),
            Err(ServiceError::Validation(_))
        ));
        assert!(validate_model_name(&"m".repeat(MAX_MODEL_NAME_LENGTH + 1)).is_err());
    }
}
