// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Anthropic Provider Adapter
//
// Anti-Corruption Layer for the Anthropic Messages API.

use crate::domain::error::GatewayError;
use crate::domain::llm::{
    CanonicalRequest, CanonicalResponse, FinishReason, MessageRole, ProviderAdapter, ProviderId,
    TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: reqwest::Client,
    id: ProviderId,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: AnthropicUsage,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicAdapter {
    pub fn new(id: ProviderId, endpoint: String, api_key: String, model: String) -> Self {
        let endpoint = if endpoint.is_empty() { DEFAULT_ENDPOINT.to_string() } else { endpoint };
        Self {
            client: reqwest::Client::new(),
            id,
            endpoint,
            api_key,
            model,
        }
    }

    /// Split canonical messages: Anthropic takes system turns as a top-level
    /// field, not as conversation messages.
    fn translate(&self, request: &CanonicalRequest) -> AnthropicRequest {
        let mut system = Vec::new();
        let mut messages = Vec::new();
        for message in &request.messages {
            match message.role {
                MessageRole::System => system.push(message.content.clone()),
                role => messages.push(AnthropicMessage {
                    role: role.as_str().to_string(),
                    content: message.content.clone(),
                }),
            }
        }

        AnthropicRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.params.max_tokens.unwrap_or(4096),
            system: if system.is_empty() { None } else { Some(system.join("\n\n")) },
            temperature: request.params.temperature,
            top_p: request.params.top_p,
            stop_sequences: request.params.stop_sequences.clone(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn identifier(&self) -> ProviderId {
        self.id.clone()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn execute(&self, request: &CanonicalRequest) -> Result<CanonicalResponse, GatewayError> {
        if request.messages.iter().all(|m| m.role == MessageRole::System) {
            return Err(GatewayError::Validation(
                "request contains no user or assistant turns".into(),
            ));
        }

        let body = self.translate(request);
        let url = format!("{}/v1/messages", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), error_text));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::ProviderInternal(format!("failed to parse response: {e}")))?;

        let content = parsed
            .content
            .first()
            .map(|c| c.text.clone())
            .unwrap_or_default();

        Ok(CanonicalResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: parsed.usage.input_tokens,
                completion_tokens: parsed.usage.output_tokens,
                total_tokens: parsed.usage.input_tokens + parsed.usage.output_tokens,
            },
            provider: self.id.clone(),
            model: self.model.clone(),
            cached: false,
            latency: Duration::ZERO,
            finish_reason: match parsed.stop_reason.as_deref() {
                Some("max_tokens") => FinishReason::Length,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        // Anthropic has no models-list endpoint; a GET on /v1/messages
        // returns 404/405 when authentication succeeds.
        let url = format!("{}/v1/messages", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .send()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status == 404 || status == 405 {
            Ok(())
        } else if status == 401 || status == 403 {
            Err(GatewayError::Authentication("invalid API key".into()))
        } else {
            Err(GatewayError::TransientNetwork(format!("HTTP {status}")))
        }
    }
}

/// Map Anthropic HTTP status codes onto the canonical taxonomy.
pub(super) fn map_status(status: u16, detail: String) -> GatewayError {
    match status {
        401 | 403 => GatewayError::Authentication(detail),
        429 => GatewayError::RateLimited(detail),
        400 | 404 | 422 => GatewayError::Validation(format!("HTTP {status}: {detail}")),
        s if s >= 500 => GatewayError::ProviderInternal(format!("HTTP {s}: {detail}")),
        s => GatewayError::ProviderInternal(format!("HTTP {s}: {detail}")),
    }
}
