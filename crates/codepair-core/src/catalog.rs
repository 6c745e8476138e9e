// Model catalog entity types
//
// A catalog model is a (provider, model name) pair that sessions can
// configure for their coder and explainer roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Model provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAI,
    Google,
    Local,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAI, Provider::Google, Provider::Local];
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::OpenAI => write!(f, "openai"),
            Provider::Google => write!(f, "google"),
            Provider::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Provider::OpenAI),
            "google" => Ok(Provider::Google),
            "local" => Ok(Provider::Local),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// Catalog model entity, unique per provider + model name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CatalogModel {
    pub id: Uuid,
    pub provider: Provider,
    pub model_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl CatalogModel {
    pub fn new(provider: Provider, model_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            provider,
            model_name: model_name.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

impl std::fmt::Display for CatalogModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_round_trip_names() {
        for provider in Provider::ALL {
            let parsed: Provider = provider.to_string().parse().unwrap();
            assert_eq!(parsed, provider);
            let json = serde_json::to_string(&provider).unwrap();
            assert_eq!(json, format!("\"{}\"", provider));
        }
        assert!("anthropic".parse::<Provider>().is_err());
    }

    #[test]
    fn test_catalog_model_display() {
        let model = CatalogModel::new(Provider::Local, "qwen2.5-coder");
        assert_eq!(model.to_string(), "local:qwen2.5-coder");
        assert!(model.is_active);
    }
}
