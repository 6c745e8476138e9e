// Tests for the Ollama driver
//
// HTTP behavior is exercised against a wiremock server standing in for the
// Ollama runtime.

use codepair_core::catalog::Provider;
use codepair_core::error::PipelineError;
use codepair_core::llm_drivers::{DriverRegistry, LlmMessage, ModelClient, ModelSpec};
use futures::stream::{self, StreamExt};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::driver::{decode_chat_stream, LineBuffer};
use crate::OllamaDriver;

fn spec(base_url: &str) -> ModelSpec {
    ModelSpec::new(Provider::Local, "qwen2.5-coder", base_url).with_temperature(0.2)
}

fn ndjson(lines: &[serde_json::Value]) -> String {
    lines
        .iter()
        .map(|line| format!("{}\n", line))
        .collect::<String>()
}

fn delta(content: &str) -> serde_json::Value {
    json!({"model": "qwen2.5-coder", "message": {"role": "assistant", "content": content}, "done": false})
}

fn done() -> serde_json::Value {
    json!({"model": "qwen2.5-coder", "message": {"role": "assistant", "content": ""}, "done": true})
}

async fn collect(driver: &OllamaDriver) -> Vec<Result<String, PipelineError>> {
    driver
        .chat_stream(vec![LlmMessage::system("be brief"), LlmMessage::user("hi")])
        .await
        .unwrap()
        .collect()
        .await
}

#[tokio::test]
async fn test_streams_fragments_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "qwen2.5-coder",
            "stream": true,
            "options": {"temperature": 0.2, "num_ctx": 2048},
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(&[
            delta("for"),
            delta(" i in range(5):"),
            delta(""),
            delta(" print(i)"),
            done(),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let driver = OllamaDriver::new(&spec(&server.uri()));
    let fragments: Vec<String> = collect(&driver)
        .await
        .into_iter()
        .map(|item| item.unwrap())
        .collect();

    assert_eq!(fragments, vec!["for", " i in range(5):", " print(i)"]);
}

#[tokio::test]
async fn test_error_status_is_model_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "model 'qwen2.5-coder' not found"})),
        )
        .mount(&server)
        .await;

    let driver = OllamaDriver::new(&spec(&server.uri()));
    let result = driver.chat_stream(vec![LlmMessage::user("hi")]).await;

    match result {
        Err(PipelineError::ModelUnavailable(message)) => {
            assert!(message.contains("404"));
            assert!(message.contains("not found"));
        }
        Err(other) => panic!("Expected ModelUnavailable, got {other}"),
        Ok(_) => panic!("Expected ModelUnavailable error"),
    }
}

#[tokio::test]
async fn test_unreachable_runtime_is_model_unavailable() {
    let driver = OllamaDriver::new(&spec("http://127.0.0.1:1"));
    let result = driver.chat_stream(vec![LlmMessage::user("hi")]).await;
    assert!(matches!(result, Err(PipelineError::ModelUnavailable(_))));
}

#[tokio::test]
async fn test_error_line_fails_after_partial_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(&[
            delta("partial"),
            json!({"error": "model runner crashed"}),
            delta("ignored"),
        ])))
        .mount(&server)
        .await;

    let driver = OllamaDriver::new(&spec(&server.uri()));
    let items = collect(&driver).await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_deref().unwrap(), "partial");
    match &items[1] {
        Err(PipelineError::ModelUnavailable(message)) => assert!(message.contains("crashed")),
        other => panic!("Expected ModelUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_truncated_stream_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(&[delta("half")])))
        .mount(&server)
        .await;

    let driver = OllamaDriver::new(&spec(&server.uri()));
    let items = collect(&driver).await;

    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(matches!(items[1], Err(PipelineError::ModelUnavailable(_))));
}

#[tokio::test]
async fn test_lines_split_across_chunks() {
    let body = ndjson(&[delta("héllo"), delta(" world"), done()]);
    // Split inside a line and inside a multi-byte character
    let split = body.find('é').unwrap() + 1;
    let bytes = body.into_bytes();
    let chunks: Vec<Vec<u8>> = vec![
        bytes[..split].to_vec(),
        bytes[split..split + 1].to_vec(),
        bytes[split + 1..].to_vec(),
    ];
    let byte_stream = stream::iter(chunks.into_iter().map(Ok::<Vec<u8>, reqwest::Error>)).boxed();

    let fragments: Vec<String> = decode_chat_stream(byte_stream)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(fragments, vec!["héllo", " world"]);
}

#[tokio::test]
async fn test_final_line_without_newline_is_decoded() {
    let body = format!("{}\n{}", delta("last"), done());
    let byte_stream = stream::iter(vec![Ok::<Vec<u8>, reqwest::Error>(body.into_bytes())]).boxed();

    let items: Vec<_> = decode_chat_stream(byte_stream).collect().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_deref().unwrap(), "last");
}

#[test]
fn test_line_buffer_keeps_partial_line() {
    let mut buffer = LineBuffer::default();
    assert!(buffer.push(b"{\"a\":").is_empty());
    assert_eq!(buffer.push(b"1}\n\n{\"b\""), vec!["{\"a\":1}"]);
    assert_eq!(buffer.finish().as_deref(), Some("{\"b\""));
    assert!(buffer.finish().is_none());
}

#[test]
fn test_register_driver_covers_all_providers() {
    let mut registry = DriverRegistry::new();
    crate::register_driver(&mut registry).unwrap();

    for provider in Provider::ALL {
        assert!(registry.has_driver(provider));
    }
}

#[test]
fn test_driver_uses_spec_settings() {
    let spec = ModelSpec::new(Provider::OpenAI, "llama3", "http://localhost:11434/")
        .with_temperature(0.9)
        .with_context_window(4096);
    let driver = OllamaDriver::new(&spec);

    assert_eq!(driver.chat_url(), "http://localhost:11434/api/chat");
}
