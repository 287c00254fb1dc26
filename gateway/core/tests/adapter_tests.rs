// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Adapter wire behavior against a mock HTTP backend: translation into each
// backend's protocol and status-code mapping onto the canonical taxonomy.

use aegis_gateway_core::infrastructure::llm::{AnthropicAdapter, OllamaAdapter, OpenAiAdapter};
use aegis_gateway_core::{
    CanonicalRequest, FinishReason, Message, ProviderAdapter, SamplingParams,
};
use mockito::Matcher;
use serde_json::json;

fn request(prompt: &str) -> CanonicalRequest {
    CanonicalRequest::from_prompt(prompt)
}

fn anthropic(server: &mockito::Server) -> AnthropicAdapter {
    AnthropicAdapter::new(
        "anthropic".into(),
        server.url(),
        "test-key".into(),
        "claude-sonnet-4-5".into(),
    )
}

#[tokio::test]
async fn anthropic_translates_and_parses() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "claude-sonnet-4-5",
            "messages": [{"role": "user", "content": "hello"}],
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "content": [{"text": "hi there"}],
                "usage": {"input_tokens": 10, "output_tokens": 5},
                "stop_reason": "end_turn",
            })
            .to_string(),
        )
        .create_async()
        .await;

    let response = anthropic(&server).execute(&request("hello")).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.content, "hi there");
    assert_eq!(response.usage.total_tokens, 15);
    assert_eq!(response.finish_reason, FinishReason::Stop);
    assert!(!response.cached);
}

#[tokio::test]
async fn anthropic_promotes_system_turns() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_body(Matcher::PartialJson(json!({
            "system": "be brief",
            "messages": [{"role": "user", "content": "hello"}],
        })))
        .with_status(200)
        .with_body(
            json!({
                "content": [{"text": "ok"}],
                "usage": {"input_tokens": 1, "output_tokens": 1},
                "stop_reason": "max_tokens",
            })
            .to_string(),
        )
        .create_async()
        .await;

    let req = CanonicalRequest::builder()
        .message(Message::system("be brief"))
        .message(Message::user("hello"))
        .params(SamplingParams::default())
        .build();
    let response = anthropic(&server).execute(&req).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.finish_reason, FinishReason::Length);
}

#[tokio::test]
async fn anthropic_rejects_system_only_requests_locally() {
    // No server: the adapter must fail before any network call.
    let adapter = AnthropicAdapter::new(
        "anthropic".into(),
        "http://127.0.0.1:1".into(),
        "k".into(),
        "m".into(),
    );
    let req = CanonicalRequest::builder().message(Message::system("only system")).build();
    let err = adapter.execute(&req).await.unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[tokio::test]
async fn anthropic_maps_status_codes() {
    let cases = [
        (401, "authentication"),
        (429, "rate_limited"),
        (404, "validation"),
        (500, "provider_internal"),
        (529, "provider_internal"),
    ];
    for (status, kind) in cases {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(status)
            .with_body("backend detail")
            .create_async()
            .await;

        let err = anthropic(&server).execute(&request("q")).await.unwrap_err();
        assert_eq!(err.kind(), kind, "HTTP {status} should map to {kind}");
    }
}

#[tokio::test]
async fn openai_translates_and_parses() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hello"}],
        })))
        .with_status(200)
        .with_body(
            json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "hey"},
                    "finish_reason": "length",
                }],
                "usage": {"prompt_tokens": 8, "completion_tokens": 2, "total_tokens": 10},
            })
            .to_string(),
        )
        .create_async()
        .await;

    let adapter =
        OpenAiAdapter::new("openai".into(), server.url(), "test-key".into(), "gpt-4o".into());
    let response = adapter.execute(&request("hello")).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.content, "hey");
    assert_eq!(response.usage.total_tokens, 10);
    assert_eq!(response.finish_reason, FinishReason::Length);
}

#[tokio::test]
async fn openai_empty_choices_is_provider_internal() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(
            json!({
                "choices": [],
                "usage": {"prompt_tokens": 1, "completion_tokens": 0, "total_tokens": 1},
            })
            .to_string(),
        )
        .create_async()
        .await;

    let adapter = OpenAiAdapter::new("openai".into(), server.url(), "k".into(), "gpt-4o".into());
    let err = adapter.execute(&request("q")).await.unwrap_err();
    assert_eq!(err.kind(), "provider_internal");
}

#[tokio::test]
async fn ollama_parses_chat_response() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": "llama3.2",
            "stream": false,
        })))
        .with_status(200)
        .with_body(
            json!({
                "message": {"role": "assistant", "content": "local answer"},
                "done": true,
                "eval_count": 4,
                "prompt_eval_count": 6,
            })
            .to_string(),
        )
        .create_async()
        .await;

    let adapter = OllamaAdapter::new("ollama-local".into(), server.url(), "llama3.2".into());
    let response = adapter.execute(&request("q")).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.content, "local answer");
    assert_eq!(response.usage.total_tokens, 10);
    assert_eq!(response.finish_reason, FinishReason::Stop);
}

#[tokio::test]
async fn ollama_missing_model_is_validation() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(404)
        .with_body("model not found")
        .create_async()
        .await;

    let adapter = OllamaAdapter::new("ollama-local".into(), server.url(), "ghost-model".into());
    let err = adapter.execute(&request("q")).await.unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[tokio::test]
async fn ollama_health_check_lists_models() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(json!({"models": []}).to_string())
        .create_async()
        .await;

    let adapter = OllamaAdapter::new("ollama-local".into(), server.url(), "llama3.2".into());
    adapter.health_check().await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn connection_failure_is_transient() {
    // Nothing listens on this port.
    let adapter = OllamaAdapter::new(
        "ollama-local".into(),
        "http://127.0.0.1:1".into(),
        "llama3.2".into(),
    );
    let err = adapter.execute(&request("q")).await.unwrap_err();
    assert_eq!(err.kind(), "transient_network");
}
