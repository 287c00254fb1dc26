// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama Provider Adapter
//
// Anti-Corruption Layer for a local Ollama runtime.
// Supports air-gapped deployments with local models.

use crate::domain::error::GatewayError;
use crate::domain::llm::{
    CanonicalRequest, CanonicalResponse, FinishReason, ProviderAdapter, ProviderId, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OllamaAdapter {
    client: reqwest::Client,
    id: ProviderId,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    done: bool,
    eval_count: Option<u32>,
    prompt_eval_count: Option<u32>,
}

impl OllamaAdapter {
    pub fn new(id: ProviderId, endpoint: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            id,
            endpoint,
            model,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
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

        let body = OllamaRequest {
            model: self.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: false,
            options: Some(OllamaOptions {
                temperature: request.params.temperature,
                top_p: request.params.top_p,
                num_predict: request.params.max_tokens.map(|t| t as i32),
                stop: request.params.stop_sequences.clone(),
            }),
        };

        let url = format!("{}/api/chat", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            // Local runtime: a 404 means the model is not pulled, which is a
            // caller-visible configuration problem, not a backend fault.
            return Err(match status.as_u16() {
                404 => GatewayError::Validation(format!("model '{}' not found", self.model)),
                400 => GatewayError::Validation(format!("HTTP 400: {error_text}")),
                s => GatewayError::ProviderInternal(format!("HTTP {s}: {error_text}")),
            });
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::ProviderInternal(format!("failed to parse response: {e}")))?;

        let prompt_tokens = parsed.prompt_eval_count.unwrap_or(0);
        let completion_tokens = parsed.eval_count.unwrap_or(0);

        Ok(CanonicalResponse {
            content: parsed.message.content,
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            provider: self.id.clone(),
            model: self.model.clone(),
            cached: false,
            latency: Duration::ZERO,
            finish_reason: if parsed.done { FinishReason::Stop } else { FinishReason::Length },
        })
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        // List models to confirm the local server is up.
        let url = format!("{}/api/tags", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(GatewayError::TransientNetwork(format!("HTTP {}", response.status())))
        }
    }
}
