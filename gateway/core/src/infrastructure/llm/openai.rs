// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI Provider Adapter
//
// Anti-Corruption Layer for the OpenAI chat-completions API.
// Also serves OpenAI-compatible endpoints (LM Studio, vLLM, etc.).

use crate::domain::error::GatewayError;
use crate::domain::llm::{
    CanonicalRequest, CanonicalResponse, FinishReason, ProviderAdapter, ProviderId, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

pub struct OpenAiAdapter {
    client: reqwest::Client,
    id: ProviderId,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: OpenAiUsage,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAiAdapter {
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
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn identifier(&self) -> ProviderId {
        self.id.clone()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn execute(&self, request: &CanonicalRequest) -> Result<CanonicalResponse, GatewayError> {
        if request.messages.is_empty() {
            return Err(GatewayError::Validation("request contains no messages".into()));
        }

        let body = OpenAiRequest {
            model: self.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: request.params.max_tokens,
            temperature: request.params.temperature,
            top_p: request.params.top_p,
            stop: request.params.stop_sequences.clone(),
        };

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(super::anthropic::map_status(status.as_u16(), error_text));
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::ProviderInternal(format!("failed to parse response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::ProviderInternal("no choices in response".into()))?;

        Ok(CanonicalResponse {
            content: choice.message.content,
            usage: TokenUsage {
                prompt_tokens: parsed.usage.prompt_tokens,
                completion_tokens: parsed.usage.completion_tokens,
                total_tokens: parsed.usage.total_tokens,
            },
            provider: self.id.clone(),
            model: self.model.clone(),
            cached: false,
            latency: Duration::ZERO,
            finish_reason: match choice.finish_reason.as_str() {
                "length" => FinishReason::Length,
                "content_filter" => FinishReason::ContentFilter,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        let url = format!("{}/models", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == 401 || status == 403 {
            Err(GatewayError::Authentication("invalid API key".into()))
        } else {
            Err(GatewayError::TransientNetwork(format!("HTTP {status}")))
        }
    }
}
