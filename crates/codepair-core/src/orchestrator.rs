// Dual-agent orchestrator
//
// Holds one model client per role together with that role's system prompt.
// A role whose configuration is missing or disabled has no slot; generating
// for it fails before any network call is attempted.

use tracing::debug;
use uuid::Uuid;

use crate::config::PipelineSettings;
use crate::error::{PipelineError, Result};
use crate::history::turns_to_messages;
use crate::llm_drivers::{BoxedModelClient, DriverRegistry, FragmentStream, ModelSpec};
use crate::role::Role;
use crate::run::Turn;
use crate::session::ModelConfig;

/// A configured agent: its client, prompt and the config it came from
#[derive(Clone)]
pub struct AgentSlot {
    pub client: BoxedModelClient,
    pub system_prompt: String,
    pub config_id: Uuid,
}

impl std::fmt::Debug for AgentSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSlot")
            .field("config_id", &self.config_id)
            .finish_non_exhaustive()
    }
}

/// Coder and explainer agents of one session
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    coder: Option<AgentSlot>,
    explainer: Option<AgentSlot>,
}

impl Orchestrator {
    /// Build an orchestrator from the session's per-role configurations
    pub fn from_configs(
        registry: &DriverRegistry,
        settings: &PipelineSettings,
        coder: Option<&ModelConfig>,
        explainer: Option<&ModelConfig>,
    ) -> Result<Self> {
        Ok(Self {
            coder: Self::slot(registry, settings, coder)?,
            explainer: Self::slot(registry, settings, explainer)?,
        })
    }

    fn slot(
        registry: &DriverRegistry,
        settings: &PipelineSettings,
        config: Option<&ModelConfig>,
    ) -> Result<Option<AgentSlot>> {
        let Some(config) = config.filter(|c| c.is_enabled) else {
            return Ok(None);
        };

        let spec = ModelSpec::from_config(config, &settings.ollama_url, settings.context_window);
        debug!(
            role = %config.role,
            provider = %spec.provider,
            model = %spec.model,
            temperature = spec.temperature,
            "Configuring agent"
        );

        Ok(Some(AgentSlot {
            client: registry.create_client(&spec)?,
            system_prompt: config.system_prompt.clone(),
            config_id: config.id,
        }))
    }

    /// Build an orchestrator from ready-made slots
    pub fn with_slots(coder: Option<AgentSlot>, explainer: Option<AgentSlot>) -> Self {
        Self { coder, explainer }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.slot_for(role).is_some()
    }

    /// ID of the model configuration backing a role
    pub fn config_id(&self, role: Role) -> Option<Uuid> {
        self.slot_for(role).map(|slot| slot.config_id)
    }

    fn slot_for(&self, role: Role) -> Option<&AgentSlot> {
        match role {
            Role::Coder => self.coder.as_ref(),
            Role::Explainer => self.explainer.as_ref(),
        }
    }

    fn require(&self, role: Role) -> Result<&AgentSlot> {
        self.slot_for(role)
            .ok_or(PipelineError::ConfigurationMissing(role))
    }

    /// Stream the coder's answer to `user_prompt`
    pub async fn generate_coder(&self, user_prompt: &str, history: &[Turn]) -> Result<FragmentStream> {
        let slot = self.require(Role::Coder)?;
        slot.client
            .stream(&slot.system_prompt, &turns_to_messages(history), user_prompt)
            .await
    }

    /// Stream the explainer's answer about `user_prompt` and the coder's output
    pub async fn generate_explainer(
        &self,
        user_prompt: &str,
        coder_output: Option<&str>,
        history: &[Turn],
    ) -> Result<FragmentStream> {
        let slot = self.require(Role::Explainer)?;
        let message = explainer_prompt(user_prompt, coder_output);
        slot.client
            .stream(&slot.system_prompt, &turns_to_messages(history), &message)
            .await
    }
}

/// Composite message sent to the explainer
pub fn explainer_prompt(user_prompt: &str, coder_output: Option<&str>) -> String {
    match coder_output.map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => format!(
            "The developer asked: '{user_prompt}'\n\
             The coder agent answered with this code:\n{code}\n\
             Explain the code to the developer."
        ),
        None => format!(
            "The developer asked: '{user_prompt}'\n\
             No code from the coder agent is available for this question.\n\
             Explain the topic to the developer."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogModel, Provider};
    use crate::llm_drivers::LlmMessage;
    use crate::memory::{MockModelClient, MockResponse};
    use std::sync::Arc;

    fn slot(client: &MockModelClient, prompt: &str) -> AgentSlot {
        AgentSlot {
            client: Arc::new(client.clone()),
            system_prompt: prompt.to_string(),
            config_id: Uuid::now_v7(),
        }
    }

    #[test]
    fn test_explainer_prompt_embeds_code() {
        let prompt = explainer_prompt("write a loop", Some("for i in x: pass"));
        assert!(prompt.contains("'write a loop'"));
        assert!(prompt.contains("for i in x: pass"));
    }

    #[test]
    fn test_explainer_prompt_placeholder_without_code() {
        for code in [None, Some(""), Some("  \n")] {
            let prompt = explainer_prompt("what is a closure?", code);
            assert!(prompt.contains("No code from the coder agent"));
        }
    }

    #[tokio::test]
    async fn test_missing_role_fails_before_any_call() {
        let coder = MockModelClient::new();
        let orchestrator = Orchestrator::with_slots(Some(slot(&coder, "code")), None);

        let result = orchestrator.generate_explainer("q", None, &[]).await;
        assert!(matches!(
            result,
            Err(PipelineError::ConfigurationMissing(Role::Explainer))
        ));
        assert!(coder.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_explainer_sees_only_its_own_history() {
        let explainer = MockModelClient::with_responses(vec![MockResponse::text("ok")]);
        let orchestrator = Orchestrator::with_slots(None, Some(slot(&explainer, "explain")));
        let history = vec![Turn {
            run_id: Uuid::now_v7(),
            prompt: "earlier".to_string(),
            output: "earlier explanation".to_string(),
        }];

        orchestrator
            .generate_explainer("now", Some("code"), &history)
            .await
            .unwrap();

        let calls = explainer.calls().await;
        assert_eq!(calls[0].len(), 4);
        assert_eq!(calls[0][0], LlmMessage::system("explain"));
        assert_eq!(calls[0][1], LlmMessage::user("earlier"));
        assert_eq!(calls[0][2], LlmMessage::assistant("earlier explanation"));
        assert_eq!(calls[0][3], LlmMessage::user(explainer_prompt("now", Some("code"))));
    }

    #[test]
    fn test_disabled_config_leaves_role_unconfigured() {
        let mut registry = DriverRegistry::new();
        registry.register(Provider::Local, |_spec| {
            Arc::new(MockModelClient::new()) as BoxedModelClient
        });
        let session_id = Uuid::now_v7();
        let coder = ModelConfig::new(
            session_id,
            Role::Coder,
            CatalogModel::new(Provider::Local, "m"),
            0.2,
            "code",
        );
        let explainer = ModelConfig::new(
            session_id,
            Role::Explainer,
            CatalogModel::new(Provider::Local, "m"),
            0.7,
            "explain",
        )
        .disabled();

        let orchestrator = Orchestrator::from_configs(
            &registry,
            &PipelineSettings::default(),
            Some(&coder),
            Some(&explainer),
        )
        .unwrap();

        assert!(orchestrator.has_role(Role::Coder));
        assert!(!orchestrator.has_role(Role::Explainer));
        assert_eq!(orchestrator.config_id(Role::Coder), Some(coder.id));
    }
}
