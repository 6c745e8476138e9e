// Ollama Driver Implementation
//
// This crate provides the model driver for a locally hosted Ollama runtime.
// It implements the ModelClient trait from codepair-core, streaming chat
// completions from Ollama's /api/chat endpoint.

mod driver;
mod types;

#[cfg(test)]
mod tests;

pub use driver::{register_driver, OllamaDriver};
pub use types::{OllamaChatChunk, OllamaChatRequest, OllamaMessage, OllamaOptions};

// Re-export core types for convenience
pub use codepair_core::llm_drivers::ModelClient;
