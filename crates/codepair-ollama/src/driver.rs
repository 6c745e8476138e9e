// Ollama Model Driver
//
// Streams chat completions from a local Ollama runtime. The response body is
// newline-delimited JSON; each line carries a content delta until a line with
// `done: true` ends the generation.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use codepair_core::catalog::Provider;
use codepair_core::error::{PipelineError, Result};
use codepair_core::llm_drivers::{
    BoxedModelClient, DriverRegistry, FragmentStream, LlmMessage, ModelClient, ModelSpec,
};

use crate::types::{OllamaChatChunk, OllamaChatRequest, OllamaErrorBody, OllamaMessage, OllamaOptions};

/// Time allowed to open a connection to the runtime
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Ollama model driver
///
/// One driver instance is bound to one model, temperature and context window.
///
/// # Example
///
/// ```ignore
/// use codepair_core::{ModelSpec, Provider};
/// use codepair_ollama::OllamaDriver;
///
/// let spec = ModelSpec::new(Provider::Local, "qwen2.5-coder", "http://127.0.0.1:11434");
/// let driver = OllamaDriver::new(&spec);
/// ```
#[derive(Clone)]
pub struct OllamaDriver {
    client: Client,
    base_url: String,
    model: String,
    options: OllamaOptions,
}

impl OllamaDriver {
    /// Create a driver for a model spec
    pub fn new(spec: &ModelSpec) -> Self {
        Self::with_client(Client::new(), spec)
    }

    /// Create a driver sharing an existing HTTP client
    pub fn with_client(client: Client, spec: &ModelSpec) -> Self {
        Self {
            client,
            base_url: spec.base_url.trim_end_matches('/').to_string(),
            model: spec.model.clone(),
            options: OllamaOptions {
                temperature: spec.temperature,
                num_ctx: spec.context_window,
            },
        }
    }

    /// Full URL of the chat endpoint
    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn build_request(&self, messages: &[LlmMessage]) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(OllamaMessage::from).collect(),
            stream: true,
            options: self.options.clone(),
        }
    }
}

#[async_trait]
impl ModelClient for OllamaDriver {
    async fn chat_stream(&self, messages: Vec<LlmMessage>) -> Result<FragmentStream> {
        let request = self.build_request(&messages);
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            temperature = self.options.temperature,
            num_ctx = self.options.num_ctx,
            "Sending Ollama chat request"
        );

        let response = self
            .client
            .post(self.chat_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                PipelineError::unavailable(format!("cannot reach Ollama at {}: {}", self.base_url, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<OllamaErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            warn!(model = %self.model, status = %status, reason = %reason, "Ollama rejected chat request");
            return Err(PipelineError::unavailable(format!(
                "Ollama request failed with status {}: {}",
                status, reason
            )));
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();

        Ok(decode_chat_stream(bytes))
    }
}

impl std::fmt::Debug for OllamaDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaDriver")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// NDJSON decoding
// ============================================================================

/// Splits a byte stream into complete lines
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and return every line completed by them
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line).trim().to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Remaining unterminated line, if any
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&rest).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

struct DecodeState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    lines: LineBuffer,
    queue: VecDeque<Result<String>>,
    finished: bool,
}

impl DecodeState {
    /// Queue the outcome of one NDJSON line
    fn accept_line(&mut self, line: &str) {
        if self.finished {
            return;
        }
        let chunk: OllamaChatChunk = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.fail(format!("malformed Ollama stream line: {}", e));
                return;
            }
        };

        if let Some(error) = &chunk.error {
            self.fail(error.clone());
            return;
        }
        if let Some(content) = chunk.content() {
            self.queue.push_back(Ok(content.to_string()));
        }
        if chunk.done {
            self.finished = true;
        }
    }

    fn fail(&mut self, message: String) {
        self.queue.push_back(Err(PipelineError::unavailable(message)));
        self.finished = true;
    }
}

/// Turn an Ollama response body into a fragment stream
pub(crate) fn decode_chat_stream(bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> FragmentStream {
    let state = DecodeState {
        bytes,
        lines: LineBuffer::default(),
        queue: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.queue.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for line in state.lines.push(&chunk) {
                        state.accept_line(&line);
                    }
                }
                Some(Err(e)) => state.fail(format!("Ollama stream interrupted: {}", e)),
                None => {
                    if let Some(line) = state.lines.finish() {
                        state.accept_line(&line);
                    }
                    if !state.finished {
                        state.fail("Ollama closed the stream before completion".to_string());
                    }
                }
            }
        }
    }))
}

// ============================================================================
// Driver Registration
// ============================================================================

/// Register the Ollama driver with the driver registry
///
/// Every catalog provider is served by the local runtime, so the driver is
/// registered for all of them. Should be called at application startup.
///
/// # Example
///
/// ```ignore
/// use codepair_core::DriverRegistry;
/// use codepair_ollama::register_driver;
///
/// let mut registry = DriverRegistry::new();
/// register_driver(&mut registry)?;
/// ```
pub fn register_driver(registry: &mut DriverRegistry) -> Result<()> {
    let client = http_client()?;
    for provider in Provider::ALL {
        let client = client.clone();
        registry.register(provider, move |spec| {
            Arc::new(OllamaDriver::with_client(client.clone(), spec)) as BoxedModelClient
        });
    }
    Ok(())
}

/// HTTP client shared by all registered drivers
fn http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| PipelineError::config(format!("cannot build Ollama HTTP client: {}", e)))
}
