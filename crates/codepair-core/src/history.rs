// Conversation memory
//
// History is reconstructed per invocation from persisted runs; nothing is
// kept in process between runs. Each role only remembers its own answers,
// paired with the user prompt that produced them.

use crate::error::Result;
use crate::llm_drivers::LlmMessage;
use crate::role::Role;
use crate::run::{Run, Turn};
use crate::traits::PipelineStore;

/// Number of past turns remembered per role
pub const DEFAULT_HISTORY_WINDOW: usize = 5;

/// Per-role bounded history for one run, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationMemory {
    pub coder: Vec<Turn>,
    pub explainer: Vec<Turn>,
}

impl ConversationMemory {
    /// Load both roles' history for `run` from the store
    pub async fn load<S>(store: &S, run: &Run, window: usize) -> Result<Self>
    where
        S: PipelineStore + ?Sized,
    {
        let coder = Self::load_role(store, run, Role::Coder, window).await?;
        let explainer = Self::load_role(store, run, Role::Explainer, window).await?;
        Ok(Self { coder, explainer })
    }

    /// Load one role's history for `run`, oldest first
    pub async fn load_role<S>(store: &S, run: &Run, role: Role, window: usize) -> Result<Vec<Turn>>
    where
        S: PipelineStore + ?Sized,
    {
        if window == 0 {
            return Ok(Vec::new());
        }
        let newest_first = store
            .recent_turns(run.session_id, role, run.id, window)
            .await?;
        Ok(oldest_first(newest_first, window))
    }

    pub fn turns(&self, role: Role) -> &[Turn] {
        match role {
            Role::Coder => &self.coder,
            Role::Explainer => &self.explainer,
        }
    }

    pub fn messages(&self, role: Role) -> Vec<LlmMessage> {
        turns_to_messages(self.turns(role))
    }
}

/// Cap a newest-first list at `window` entries and flip it to oldest first
pub fn oldest_first(mut newest_first: Vec<Turn>, window: usize) -> Vec<Turn> {
    newest_first.truncate(window);
    newest_first.reverse();
    newest_first
}

/// Expand turns into alternating user/assistant messages
pub fn turns_to_messages(turns: &[Turn]) -> Vec<LlmMessage> {
    turns
        .iter()
        .flat_map(|turn| {
            [
                LlmMessage::user(turn.prompt.clone()),
                LlmMessage::assistant(turn.output.clone()),
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogModel, Provider};
    use crate::memory::InMemoryPipelineStore;
    use crate::run::{NewRunResult, RunResultStatus, RunStatus};
    use crate::session::ModelConfig;
    use uuid::Uuid;

    fn turn(prompt: &str, output: &str) -> Turn {
        Turn {
            run_id: Uuid::now_v7(),
            prompt: prompt.to_string(),
            output: output.to_string(),
        }
    }

    async fn finished_run(
        store: &InMemoryPipelineStore,
        session_id: Uuid,
        prompt: &str,
        results: &[(Role, RunResultStatus, &str)],
        status: RunStatus,
    ) -> Run {
        let run = store.create_run(session_id, prompt, Role::Coder).await;
        for (role, result_status, output) in results {
            store
                .create_run_result(NewRunResult {
                    run_id: run.id,
                    model_config_id: None,
                    role: *role,
                    output: output.to_string(),
                    status: *result_status,
                })
                .await
                .unwrap();
        }
        if status.is_terminal() {
            store.finish_run(run.id, status).await.unwrap();
        }
        run
    }

    #[test]
    fn test_oldest_first_caps_and_reverses() {
        let newest_first = vec![turn("3", "c"), turn("2", "b"), turn("1", "a")];
        let turns = oldest_first(newest_first, 2);
        let prompts: Vec<_> = turns.iter().map(|t| t.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["2", "3"]);
    }

    #[test]
    fn test_turns_to_messages_alternates() {
        let messages = turns_to_messages(&[turn("q1", "a1"), turn("q2", "a2")]);
        assert_eq!(
            messages,
            vec![
                LlmMessage::user("q1"),
                LlmMessage::assistant("a1"),
                LlmMessage::user("q2"),
                LlmMessage::assistant("a2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_each_role_remembers_only_its_own_output() {
        let store = InMemoryPipelineStore::new();
        let session_id = Uuid::now_v7();
        finished_run(
            &store,
            session_id,
            "write a loop",
            &[
                (Role::Coder, RunResultStatus::Success, "for i in x: pass"),
                (Role::Explainer, RunResultStatus::Success, "It loops."),
            ],
            RunStatus::Success,
        )
        .await;

        let current = store.create_run(session_id, "next", Role::Coder).await;
        let memory = ConversationMemory::load(&store, &current, DEFAULT_HISTORY_WINDOW)
            .await
            .unwrap();

        assert_eq!(memory.coder.len(), 1);
        assert_eq!(memory.coder[0].prompt, "write a loop");
        assert_eq!(memory.coder[0].output, "for i in x: pass");
        assert_eq!(memory.explainer.len(), 1);
        assert_eq!(memory.explainer[0].prompt, "write a loop");
        assert_eq!(memory.explainer[0].output, "It loops.");
    }

    #[tokio::test]
    async fn test_partial_success_contributes_only_successful_role() {
        let store = InMemoryPipelineStore::new();
        let session_id = Uuid::now_v7();
        finished_run(
            &store,
            session_id,
            "sort a list",
            &[(Role::Coder, RunResultStatus::Success, "sorted(xs)")],
            RunStatus::Error,
        )
        .await;

        let current = store.create_run(session_id, "next", Role::Coder).await;
        let memory = ConversationMemory::load(&store, &current, 5).await.unwrap();

        assert_eq!(memory.coder.len(), 1);
        assert!(memory.explainer.is_empty());
    }

    #[tokio::test]
    async fn test_window_keeps_most_recent_oldest_first() {
        let store = InMemoryPipelineStore::new();
        let session_id = Uuid::now_v7();
        for i in 0..7 {
            finished_run(
                &store,
                session_id,
                &format!("prompt {i}"),
                &[(Role::Coder, RunResultStatus::Success, "code")],
                RunStatus::Error,
            )
            .await;
        }

        let current = store.create_run(session_id, "next", Role::Coder).await;
        let turns = ConversationMemory::load_role(&store, &current, Role::Coder, 5)
            .await
            .unwrap();

        let prompts: Vec<_> = turns.iter().map(|t| t.prompt.clone()).collect();
        assert_eq!(
            prompts,
            vec!["prompt 2", "prompt 3", "prompt 4", "prompt 5", "prompt 6"]
        );
    }

    #[tokio::test]
    async fn test_excludes_current_pending_and_other_sessions() {
        let store = InMemoryPipelineStore::new();
        let session_id = Uuid::now_v7();

        // In-flight run with a committed coder result
        finished_run(
            &store,
            session_id,
            "in flight",
            &[(Role::Coder, RunResultStatus::Success, "partial")],
            RunStatus::Pending,
        )
        .await;
        // Failed result does not count
        finished_run(
            &store,
            session_id,
            "failed",
            &[(Role::Coder, RunResultStatus::Error, "boom")],
            RunStatus::Error,
        )
        .await;
        // Another session
        finished_run(
            &store,
            Uuid::now_v7(),
            "elsewhere",
            &[(Role::Coder, RunResultStatus::Success, "x")],
            RunStatus::Success,
        )
        .await;

        let current = store.create_run(session_id, "now", Role::Coder).await;
        store
            .create_run_result(NewRunResult {
                run_id: current.id,
                model_config_id: None,
                role: Role::Coder,
                output: "own output".to_string(),
                status: RunResultStatus::Success,
            })
            .await
            .unwrap();

        let memory = ConversationMemory::load(&store, &current, 5).await.unwrap();
        assert!(memory.coder.is_empty());
        assert!(memory.explainer.is_empty());
    }

    #[tokio::test]
    async fn test_zero_window_skips_store() {
        let store = InMemoryPipelineStore::new();
        let session_id = Uuid::now_v7();
        let model = CatalogModel::new(Provider::Local, "m");
        store
            .add_config(ModelConfig::new(session_id, Role::Coder, model, 0.1, "s"))
            .await;
        finished_run(
            &store,
            session_id,
            "p",
            &[(Role::Coder, RunResultStatus::Success, "o")],
            RunStatus::Success,
        )
        .await;

        let current = store.create_run(session_id, "now", Role::Coder).await;
        let memory = ConversationMemory::load(&store, &current, 0).await.unwrap();
        assert_eq!(memory, ConversationMemory::default());
    }
}
