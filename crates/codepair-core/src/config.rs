// Pipeline settings
//
// PipelineSettings is a DB-agnostic configuration struct that can be:
// - Created directly with defaults for tests
// - Read from the process environment via `from_env`

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::history::DEFAULT_HISTORY_WINDOW;
use crate::llm_drivers::DEFAULT_CONTEXT_WINDOW;

/// Default base address of the local model runtime
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Settings shared by every run of the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Base address of the model runtime
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Context window (tokens) requested for every model call
    #[serde(default = "default_context_window")]
    pub context_window: u32,

    /// Number of past turns remembered per role
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_ollama_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_context_window() -> u32 {
    DEFAULT_CONTEXT_WINDOW
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            context_window: default_context_window(),
            history_window: default_history_window(),
        }
    }
}

impl PipelineSettings {
    /// Read `OLLAMA_URL`, `MODEL_CONTEXT_WINDOW` and `HISTORY_WINDOW`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(url) = lookup("OLLAMA_URL").filter(|v| !v.trim().is_empty()) {
            settings.ollama_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(raw) = lookup("MODEL_CONTEXT_WINDOW") {
            settings.context_window = raw.trim().parse().map_err(|_| {
                PipelineError::config(format!("MODEL_CONTEXT_WINDOW must be a number, got '{raw}'"))
            })?;
        }
        if let Some(raw) = lookup("HISTORY_WINDOW") {
            settings.history_window = raw.trim().parse().map_err(|_| {
                PipelineError::config(format!("HISTORY_WINDOW must be a number, got '{raw}'"))
            })?;
        }

        Ok(settings)
    }

    pub fn with_ollama_url(mut self, url: impl Into<String>) -> Self {
        self.ollama_url = url.into();
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_context_window(mut self, context_window: u32) -> Self {
        self.context_window = context_window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = PipelineSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.ollama_url, "http://127.0.0.1:11434");
        assert_eq!(settings.context_window, 2048);
        assert_eq!(settings.history_window, 5);
    }

    #[test]
    fn test_overrides() {
        let settings = PipelineSettings::from_lookup(lookup(&[
            ("OLLAMA_URL", "http://ollama:11434/"),
            ("MODEL_CONTEXT_WINDOW", "8192"),
            ("HISTORY_WINDOW", "3"),
        ]))
        .unwrap();
        assert_eq!(settings.ollama_url, "http://ollama:11434");
        assert_eq!(settings.context_window, 8192);
        assert_eq!(settings.history_window, 3);
    }

    #[test]
    fn test_invalid_number_is_configuration_error() {
        let err = PipelineSettings::from_lookup(lookup(&[("HISTORY_WINDOW", "many")])).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
