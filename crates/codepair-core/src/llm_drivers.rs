// Model Client Abstractions
//
// This module encapsulates everything needed to talk to a model runtime:
// - ModelClient trait: "send messages, receive incremental text"
// - ModelSpec describing one configured endpoint (model, temperature, context window)
// - DriverRegistry for dynamic driver registration at startup
//
// Design: Dependency inversion - runtime crates (codepair-ollama) depend on core
// and register their drivers at startup. Core has no knowledge of specific runtimes.

use async_trait::async_trait;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use crate::catalog::Provider;
use crate::error::{PipelineError, Result};
use crate::session::ModelConfig;

/// Default number of context tokens requested from the runtime
pub const DEFAULT_CONTEXT_WINDOW: u32 = 2048;

// ============================================================================
// ModelClient Trait
// ============================================================================

/// Lazy, finite sequence of text fragments produced by one model call.
///
/// An `Err` item means the model became unavailable mid-stream; fragments
/// already yielded stay valid.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Trait for model clients
///
/// Implementations perform no retries. Dropping the returned stream releases
/// the underlying connection.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Stream a chat completion for a prepared message list
    async fn chat_stream(&self, messages: Vec<LlmMessage>) -> Result<FragmentStream>;

    /// Stream a reply to `new_message` given a system prompt and prior history
    async fn stream(
        &self,
        system_prompt: &str,
        history: &[LlmMessage],
        new_message: &str,
    ) -> Result<FragmentStream> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(LlmMessage::system(system_prompt));
        messages.extend_from_slice(history);
        messages.push(LlmMessage::user(new_message));
        self.chat_stream(messages).await
    }
}

/// Shared, dynamically dispatched model client
pub type BoxedModelClient = Arc<dyn ModelClient>;

// ============================================================================
// Message Types
// ============================================================================

/// Message role for model calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmMessageRole {
    System,
    User,
    Assistant,
}

impl LlmMessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmMessageRole::System => "system",
            LlmMessageRole::User => "user",
            LlmMessageRole::Assistant => "assistant",
        }
    }
}

/// Role-tagged message sent to the model runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmMessage {
    pub role: LlmMessageRole,
    pub content: String,
}

impl LlmMessage {
    pub fn new(role: LlmMessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(LlmMessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(LlmMessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(LlmMessageRole::Assistant, content)
    }
}

// ============================================================================
// Model Spec
// ============================================================================

/// Everything a driver needs to reach one model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub provider: Provider,
    pub model: String,
    pub temperature: f32,
    pub context_window: u32,
    pub base_url: String,
}

impl ModelSpec {
    pub fn new(provider: Provider, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            context_window: DEFAULT_CONTEXT_WINDOW,
            base_url: base_url.into(),
        }
    }

    /// Build a spec from a session's model configuration
    pub fn from_config(config: &ModelConfig, base_url: &str, context_window: u32) -> Self {
        Self {
            provider: config.model.provider,
            model: config.model.model_name.trim().to_string(),
            temperature: config.temperature,
            context_window,
            base_url: base_url.to_string(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_context_window(mut self, context_window: u32) -> Self {
        self.context_window = context_window;
        self
    }
}

// ============================================================================
// Driver Registry
// ============================================================================

/// Factory function type for creating model clients
pub type DriverFactory = Arc<dyn Fn(&ModelSpec) -> BoxedModelClient + Send + Sync>;

/// Registry of driver factories keyed by provider
///
/// # Example
///
/// ```ignore
/// use codepair_core::llm_drivers::DriverRegistry;
///
/// let mut registry = DriverRegistry::new();
/// codepair_ollama::register_driver(&mut registry)?;
///
/// let client = registry.create_client(&spec)?;
/// ```
#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: HashMap<Provider, DriverFactory>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a driver factory for a provider
    pub fn register<F>(&mut self, provider: Provider, factory: F)
    where
        F: Fn(&ModelSpec) -> BoxedModelClient + Send + Sync + 'static,
    {
        self.factories.insert(provider, Arc::new(factory));
    }

    /// Create a model client for a spec
    ///
    /// Returns `DriverNotRegistered` if no driver is registered for the provider.
    pub fn create_client(&self, spec: &ModelSpec) -> Result<BoxedModelClient> {
        let factory = self
            .factories
            .get(&spec.provider)
            .ok_or_else(|| PipelineError::driver_not_registered(spec.provider.to_string()))?;
        Ok(factory(spec))
    }

    /// Check if a driver is registered for a provider
    pub fn has_driver(&self, provider: Provider) -> bool {
        self.factories.contains_key(&provider)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("providers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MockModelClient, MockResponse};
    use futures::StreamExt;

    #[test]
    fn test_registry_returns_error_for_unregistered_provider() {
        let registry = DriverRegistry::new();
        let spec = ModelSpec::new(Provider::Google, "gemma", "http://localhost");

        match registry.create_client(&spec) {
            Err(PipelineError::DriverNotRegistered(provider)) => assert_eq!(provider, "google"),
            Err(other) => panic!("Expected DriverNotRegistered, got {other}"),
            Ok(_) => panic!("Expected DriverNotRegistered error"),
        }
    }

    #[test]
    fn test_registry_creates_registered_driver() {
        let mut registry = DriverRegistry::new();
        registry.register(Provider::Local, |_spec| {
            Arc::new(MockModelClient::new()) as BoxedModelClient
        });

        assert!(registry.has_driver(Provider::Local));
        assert!(!registry.has_driver(Provider::OpenAI));

        let spec = ModelSpec::new(Provider::Local, "llama3", "http://localhost");
        assert!(registry.create_client(&spec).is_ok());
    }

    #[tokio::test]
    async fn test_stream_builds_system_history_user_messages() {
        let client = MockModelClient::with_responses(vec![MockResponse::fragments(["ok"])]);
        let history = vec![LlmMessage::user("earlier"), LlmMessage::assistant("reply")];

        let stream = client.stream("be brief", &history, "now").await.unwrap();
        let fragments: Vec<_> = stream.collect().await;
        assert_eq!(fragments.len(), 1);

        let calls = client.calls().await;
        assert_eq!(
            calls[0],
            vec![
                LlmMessage::system("be brief"),
                LlmMessage::user("earlier"),
                LlmMessage::assistant("reply"),
                LlmMessage::user("now"),
            ]
        );
    }

    #[test]
    fn test_spec_from_config_trims_model_name() {
        let model = crate::catalog::CatalogModel::new(Provider::Local, "  codellama \n");
        let config = ModelConfig::new(uuid::Uuid::now_v7(), crate::Role::Coder, model, 0.2, "x");
        let spec = ModelSpec::from_config(&config, "http://127.0.0.1:11434", 4096);

        assert_eq!(spec.model, "codellama");
        assert_eq!(spec.temperature, 0.2);
        assert_eq!(spec.context_window, 4096);
    }
}
