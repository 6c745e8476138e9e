// Server configuration
//
// Read from environment variables (a `.env` file is loaded first by main).

use anyhow::{Context, Result};
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9000";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: String,
    /// Prefix for API routes, e.g. "/api" gives /api/v1/sessions
    pub api_prefix: String,
    /// Allowed CORS origins; empty means same-origin only
    pub cors_origins: Vec<String>,
    /// Exercise content document served under /v1/learn
    pub exercises_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url =
            non_empty("DATABASE_URL").context("DATABASE_URL environment variable required")?;

        let cors_origins = non_empty("CORS_ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url,
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            api_prefix: non_empty("API_PREFIX").unwrap_or_default(),
            cors_origins,
            exercises_path: non_empty("EXERCISES_PATH").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://db")])).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.api_prefix, "");
        assert!(config.cors_origins.is_empty());
        assert!(config.exercises_path.is_none());
    }

    #[test]
    fn test_database_url_required() {
        assert!(ServerConfig::from_lookup(lookup(&[])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).is_err());
    }

    #[test]
    fn test_cors_origins_are_split_and_trimmed() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example.com, https://b.example.com,"),
            ("EXERCISES_PATH", "content/exercises.json"),
            ("BIND_ADDR", "127.0.0.1:8080"),
        ]))
        .unwrap();

        assert_eq!(
            config.cors_origins,
            vec!["https://a.example.com", "https://b.example.com"]
        );
        assert_eq!(
            config.exercises_path,
            Some(PathBuf::from("content/exercises.json"))
        );
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
    }
}
