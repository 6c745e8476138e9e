// Run Pipeline
//
// Drives one submitted prompt through the coder phase and then the explainer
// phase (or the explainer alone), forwarding every fragment as a tagged event
// while it is produced, persisting phase outputs and finalizing the run.
//
// The pipeline runs as its own task and writes into a bounded channel of
// capacity 1, so it never gets more than one fragment ahead of the consumer.
// Dropping the receiving side is treated as a client disconnect: the current
// model stream is dropped, the phase result is not persisted and the run is
// marked as error.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::config::PipelineSettings;
use crate::error::{PipelineError, Result};
use crate::events::{EventSender, PipelineEvent, EXPLAINER_ONLY_NOTICE};
use crate::history::ConversationMemory;
use crate::llm_drivers::{DriverRegistry, FragmentStream};
use crate::orchestrator::Orchestrator;
use crate::role::Role;
use crate::run::{NewRunResult, Run, RunResultStatus, RunStatus};
use crate::traits::PipelineStore;

/// Events buffered between the pipeline task and its consumer
pub const EVENT_CHANNEL_CAPACITY: usize = 1;

// ============================================================================
// Request Types
// ============================================================================

/// Which phases a run executes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum RunTarget {
    /// Coder, then explainer
    #[default]
    Pipeline,
    /// Explainer only
    Explainer,
}

impl RunTarget {
    /// Roles that must have an enabled configuration
    pub fn required_roles(&self) -> &'static [Role] {
        match self {
            RunTarget::Pipeline => &[Role::Coder, Role::Explainer],
            RunTarget::Explainer => &[Role::Explainer],
        }
    }
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunTarget::Pipeline => write!(f, "pipeline"),
            RunTarget::Explainer => write!(f, "explainer"),
        }
    }
}

impl FromStr for RunTarget {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pipeline" => Ok(RunTarget::Pipeline),
            "explainer" => Ok(RunTarget::Explainer),
            other => Err(PipelineError::validation(format!(
                "Unknown target '{}'. Use 'pipeline' or 'explainer'",
                other
            ))),
        }
    }
}

/// Everything needed to execute one run
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// The pending run created by the caller
    pub run: Run,
    pub target: RunTarget,
    /// Previous coder output to explain in explainer-only mode
    pub coder_output: Option<String>,
    /// Explain the session's most recent successful coder output when no
    /// `coder_output` is given (explainer-only mode)
    pub reuse_last_code: bool,
}

impl RunRequest {
    pub fn new(run: Run, target: RunTarget) -> Self {
        Self {
            run,
            target,
            coder_output: None,
            reuse_last_code: false,
        }
    }

    pub fn with_coder_output(mut self, coder_output: impl Into<String>) -> Self {
        self.coder_output = Some(coder_output.into());
        self
    }

    pub fn with_reuse_last_code(mut self, reuse: bool) -> Self {
        self.reuse_last_code = reuse;
        self
    }
}

// ============================================================================
// State Machine
// ============================================================================

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initialized,
    CoderRunning,
    CoderDone,
    ExplainerRunning,
    ExplainerOnlyRunning,
    Terminal(RunStatus),
}

impl PipelineState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Terminal(_), _) => false,
            (_, Terminal(RunStatus::Pending)) => false,
            (_, Terminal(_)) => true,
            (Initialized, CoderRunning) | (Initialized, ExplainerOnlyRunning) => true,
            (CoderRunning, CoderDone) => true,
            (CoderDone, ExplainerRunning) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Terminal(_))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Initialized => write!(f, "initialized"),
            PipelineState::CoderRunning => write!(f, "coder_running"),
            PipelineState::CoderDone => write!(f, "coder_done"),
            PipelineState::ExplainerRunning => write!(f, "explainer_running"),
            PipelineState::ExplainerOnlyRunning => write!(f, "explainer_only_running"),
            PipelineState::Terminal(status) => write!(f, "terminal({})", status),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    /// The consumer went away before the run finished
    pub disconnected: bool,
}

/// How a single phase ended
#[derive(Debug)]
pub enum PhaseOutcome {
    /// Full accumulated text
    Completed(String),
    Failed(PipelineError),
    Disconnected,
}

/// A started pipeline: its event stream and the task producing it
pub struct RunningPipeline {
    pub run_id: Uuid,
    pub events: ReceiverStream<PipelineEvent>,
    pub handle: JoinHandle<RunOutcome>,
}

// ============================================================================
// RunPipeline
// ============================================================================

/// Executes runs against a store and a driver registry
#[derive(Clone)]
pub struct RunPipeline {
    store: Arc<dyn PipelineStore>,
    registry: Arc<DriverRegistry>,
    settings: PipelineSettings,
}

impl fmt::Debug for RunPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunPipeline")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RunPipeline {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        registry: Arc<DriverRegistry>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            registry,
            settings,
        }
    }

    /// Spawn the run on its own task and hand back its event stream
    ///
    /// If the run task dies (panic or abort) the run is still moved to error.
    pub fn start(&self, request: RunRequest) -> RunningPipeline {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let run_id = request.run.id;
        let span = info_span!(
            "run_pipeline",
            run_id = %run_id,
            session_id = %request.run.session_id,
            target = %request.target,
        );

        let pipeline = self.clone();
        let task = tokio::spawn(
            async move { pipeline.execute(request, &tx).await }.instrument(span.clone()),
        );

        let store = self.store.clone();
        let handle = tokio::spawn(
            async move {
                match task.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(error = %e, "Run task terminated abnormally");
                        if let Err(e) = store.finish_run(run_id, RunStatus::Error).await {
                            error!(error = %e, "Failed to mark run as error");
                        }
                        RunOutcome {
                            run_id,
                            status: RunStatus::Error,
                            disconnected: false,
                        }
                    }
                }
            }
            .instrument(span),
        );

        RunningPipeline {
            run_id,
            events: ReceiverStream::new(rx),
            handle,
        }
    }

    /// Execute a run to completion, writing events into `sink`
    ///
    /// The run always ends in a terminal status, whatever happens to the
    /// model runtime, the store or the consumer.
    pub async fn execute(&self, request: RunRequest, sink: &mpsc::Sender<PipelineEvent>) -> RunOutcome {
        let mut execution = Execution {
            pipeline: self,
            request: &request,
            sink,
            state: PipelineState::Initialized,
            disconnected: false,
        };
        let status = execution.run().await;

        RunOutcome {
            run_id: request.run.id,
            status,
            disconnected: execution.disconnected,
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Prepared inputs of a run
struct Prepared {
    orchestrator: Orchestrator,
    memory: ConversationMemory,
    /// Code context for explainer-only runs
    reused_code: Option<String>,
}

/// One in-flight run
struct Execution<'a> {
    pipeline: &'a RunPipeline,
    request: &'a RunRequest,
    sink: &'a mpsc::Sender<PipelineEvent>,
    state: PipelineState,
    disconnected: bool,
}

impl Execution<'_> {
    fn run_id(&self) -> Uuid {
        self.request.run.id
    }

    fn transition(&mut self, next: PipelineState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Unexpected pipeline transition");
        }
        debug!(from = %self.state, to = %next, "Pipeline state transition");
        self.state = next;
    }

    async fn run(&mut self) -> RunStatus {
        let prepared = match self.prepare().await {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(error = %e, "Pipeline setup failed");
                self.emit(PipelineEvent::error(EventSender::System, e.client_message()))
                    .await;
                return self.finish(RunStatus::Error).await;
            }
        };

        let request = self.request;
        let prompt = request.run.prompt.as_str();
        let orchestrator = &prepared.orchestrator;

        let code = match request.target {
            RunTarget::Pipeline => {
                self.transition(PipelineState::CoderRunning);
                let open = orchestrator.generate_coder(prompt, &prepared.memory.coder);
                let code = match self.drive_phase(Role::Coder, open).await {
                    PhaseOutcome::Completed(code) => code,
                    outcome => return self.fail_phase(Role::Coder, outcome).await,
                };
                if let Err(e) = self
                    .persist(Role::Coder, orchestrator.config_id(Role::Coder), &code)
                    .await
                {
                    return self.fail_persistence(e).await;
                }
                self.transition(PipelineState::CoderDone);
                self.transition(PipelineState::ExplainerRunning);
                Some(code)
            }
            RunTarget::Explainer => {
                if !self
                    .emit(PipelineEvent::text(EventSender::System, EXPLAINER_ONLY_NOTICE))
                    .await
                {
                    return self.abandon().await;
                }
                self.transition(PipelineState::ExplainerOnlyRunning);
                prepared.reused_code.clone()
            }
        };

        let open =
            orchestrator.generate_explainer(prompt, code.as_deref(), &prepared.memory.explainer);
        let explanation = match self.drive_phase(Role::Explainer, open).await {
            PhaseOutcome::Completed(text) => text,
            outcome => return self.fail_phase(Role::Explainer, outcome).await,
        };
        if let Err(e) = self
            .persist(
                Role::Explainer,
                orchestrator.config_id(Role::Explainer),
                &explanation,
            )
            .await
        {
            return self.fail_persistence(e).await;
        }

        self.finish(RunStatus::Success).await
    }

    /// Resolve configurations, build the agents and load history
    async fn prepare(&self) -> Result<Prepared> {
        let store = self.pipeline.store.as_ref();
        let run = &self.request.run;

        let mut coder = None;
        let mut explainer = None;
        for &role in self.request.target.required_roles() {
            let config = store
                .enabled_config(run.session_id, role)
                .await?
                .ok_or(PipelineError::ConfigurationMissing(role))?;
            match role {
                Role::Coder => coder = Some(config),
                Role::Explainer => explainer = Some(config),
            }
        }

        let orchestrator = Orchestrator::from_configs(
            &self.pipeline.registry,
            &self.pipeline.settings,
            coder.as_ref(),
            explainer.as_ref(),
        )?;

        let window = self.pipeline.settings.history_window;
        let memory = match self.request.target {
            RunTarget::Pipeline => ConversationMemory::load(store, run, window).await?,
            RunTarget::Explainer => ConversationMemory {
                coder: Vec::new(),
                explainer: ConversationMemory::load_role(store, run, Role::Explainer, window)
                    .await?,
            },
        };

        let reused_code = match (&self.request.target, &self.request.coder_output) {
            (RunTarget::Explainer, Some(code)) => Some(code.clone()),
            (RunTarget::Explainer, None) if self.request.reuse_last_code => store
                .recent_turns(run.session_id, Role::Coder, run.id, 1)
                .await?
                .into_iter()
                .next()
                .map(|turn| turn.output),
            _ => None,
        };

        debug!(
            coder_turns = memory.coder.len(),
            explainer_turns = memory.explainer.len(),
            has_code_context = reused_code.is_some(),
            "Pipeline prepared"
        );

        Ok(Prepared {
            orchestrator,
            memory,
            reused_code,
        })
    }

    /// Open one role's stream and forward its fragments until it ends
    ///
    /// The consumer is watched from the moment the request is sent, so a
    /// runtime that never answers cannot keep an abandoned run pending.
    async fn drive_phase<F>(&mut self, role: Role, open: F) -> PhaseOutcome
    where
        F: Future<Output = Result<FragmentStream>>,
    {
        let sink = self.sink;
        let opened = tokio::select! {
            biased;
            _ = sink.closed() => return PhaseOutcome::Disconnected,
            opened = open => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return PhaseOutcome::Failed(e),
        };

        let mut buffer = String::new();
        loop {
            let item = tokio::select! {
                biased;
                _ = self.sink.closed() => return PhaseOutcome::Disconnected,
                item = stream.next() => item,
            };

            match item {
                None => return PhaseOutcome::Completed(buffer),
                Some(Err(e)) => return PhaseOutcome::Failed(e),
                Some(Ok(fragment)) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    buffer.push_str(&fragment);
                    if !self.emit(PipelineEvent::text(role, fragment)).await {
                        return PhaseOutcome::Disconnected;
                    }
                }
            }
        }
    }

    /// Report a phase that did not complete and end the run
    async fn fail_phase(&mut self, role: Role, outcome: PhaseOutcome) -> RunStatus {
        match outcome {
            PhaseOutcome::Failed(e) => {
                warn!(role = %role, error = %e, "Phase failed");
                let sender = match &e {
                    PipelineError::ConfigurationMissing(_) => EventSender::System,
                    _ => EventSender::from(role),
                };
                self.emit(PipelineEvent::error(sender, e.client_message())).await;
                self.finish(RunStatus::Error).await
            }
            PhaseOutcome::Disconnected => self.abandon().await,
            PhaseOutcome::Completed(_) => self.finish(RunStatus::Error).await,
        }
    }

    async fn persist(&self, role: Role, model_config_id: Option<Uuid>, output: &str) -> Result<()> {
        let result = self
            .pipeline
            .store
            .create_run_result(NewRunResult {
                run_id: self.run_id(),
                model_config_id,
                role,
                output: output.to_string(),
                status: RunResultStatus::Success,
            })
            .await?;
        debug!(role = %role, result_id = %result.id, chars = output.len(), "Phase result persisted");
        Ok(())
    }

    async fn fail_persistence(&mut self, e: PipelineError) -> RunStatus {
        error!(error = %e, "Failed to persist phase result");
        self.emit(PipelineEvent::error(EventSender::System, e.client_message()))
            .await;
        self.finish(RunStatus::Error).await
    }

    /// The consumer is gone; stop without persisting the current phase
    async fn abandon(&mut self) -> RunStatus {
        warn!("Client disconnected, abandoning run");
        self.disconnected = true;
        self.finish(RunStatus::Error).await
    }

    /// Write the terminal status of the run
    async fn finish(&mut self, status: RunStatus) -> RunStatus {
        let pipeline = self.pipeline;
        let store = &pipeline.store;
        let final_status = match store.finish_run(self.run_id(), status).await {
            Ok(true) => status,
            Ok(false) => {
                warn!(status = %status, "Run was already finalized");
                status
            }
            Err(e) if status == RunStatus::Success => {
                error!(error = %e, "Failed to mark run as success");
                self.emit(PipelineEvent::error(EventSender::System, e.client_message()))
                    .await;
                if let Err(e) = store.finish_run(self.run_id(), RunStatus::Error).await {
                    error!(error = %e, "Failed to mark run as error");
                }
                RunStatus::Error
            }
            Err(e) => {
                error!(error = %e, "Failed to mark run as error");
                RunStatus::Error
            }
        };

        self.transition(PipelineState::Terminal(final_status));
        info!(status = %final_status, "Run finished");
        final_status
    }

    /// Send one event; false once the consumer has gone away
    async fn emit(&mut self, event: PipelineEvent) -> bool {
        if self.disconnected {
            return false;
        }
        if self.sink.send(event).await.is_err() {
            self.disconnected = true;
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parse() {
        assert_eq!("pipeline".parse::<RunTarget>().unwrap(), RunTarget::Pipeline);
        assert_eq!("explainer".parse::<RunTarget>().unwrap(), RunTarget::Explainer);
        assert!(matches!(
            "coder".parse::<RunTarget>(),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_required_roles() {
        assert_eq!(
            RunTarget::Pipeline.required_roles(),
            &[Role::Coder, Role::Explainer]
        );
        assert_eq!(RunTarget::Explainer.required_roles(), &[Role::Explainer]);
    }

    #[test]
    fn test_state_transitions() {
        use PipelineState::*;

        assert!(Initialized.can_transition_to(CoderRunning));
        assert!(Initialized.can_transition_to(ExplainerOnlyRunning));
        assert!(Initialized.can_transition_to(Terminal(RunStatus::Error)));
        assert!(CoderRunning.can_transition_to(CoderDone));
        assert!(CoderRunning.can_transition_to(Terminal(RunStatus::Error)));
        assert!(CoderDone.can_transition_to(ExplainerRunning));
        assert!(ExplainerRunning.can_transition_to(Terminal(RunStatus::Success)));

        assert!(!Initialized.can_transition_to(ExplainerRunning));
        assert!(!CoderRunning.can_transition_to(ExplainerRunning));
        assert!(!ExplainerOnlyRunning.can_transition_to(CoderRunning));
        assert!(!Terminal(RunStatus::Success).can_transition_to(Terminal(RunStatus::Error)));
        assert!(!CoderRunning.can_transition_to(Terminal(RunStatus::Pending)));
    }
}
