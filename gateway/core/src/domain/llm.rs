// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Canonical LLM Contract (Anti-Corruption Layer)
//
// Defines the provider-agnostic request/response shape all backend adapters
// translate to and from. Prevents vendor lock-in: nothing above this module
// ever sees a backend-specific type or error code.
//
// Implementations in infrastructure/llm/ directory.

use crate::domain::error::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier of a registered provider (e.g. "anthropic", "ollama-local").
///
/// Used for circuit-breaker and rate-limiter bucketing and for tagging
/// [`CanonicalResponse::provider`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Role tag on a message turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Wire-format role string shared by the hosted-API backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One role-tagged turn in a canonical conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: MessageRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}

/// Sampling parameters for generation.
///
/// Every field here affects model output and therefore participates in
/// cache-key derivation (see `domain::cache`). Tracing metadata must never
/// be added to this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: Option<f32>,

    /// Nucleus sampling cutoff
    pub top_p: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Sequences that stop generation
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            top_p: None,
            max_tokens: Some(4096),
            stop_sequences: None,
        }
    }
}

/// Provider-agnostic request. Immutable once constructed; build via
/// [`CanonicalRequest::builder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRequest {
    pub messages: Vec<Message>,
    pub params: SamplingParams,
    /// Explicit cache key, bypassing content-hash derivation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key_override: Option<String>,
}

impl CanonicalRequest {
    pub fn builder() -> CanonicalRequestBuilder {
        CanonicalRequestBuilder::default()
    }

    /// Single user-turn request with default sampling, the common case for
    /// swarm sub-tasks.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            params: SamplingParams::default(),
            cache_key_override: None,
        }
    }
}

/// Builder for [`CanonicalRequest`].
#[derive(Debug, Default)]
pub struct CanonicalRequestBuilder {
    messages: Vec<Message>,
    params: Option<SamplingParams>,
    cache_key_override: Option<String>,
}

impl CanonicalRequestBuilder {
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn params(mut self, params: SamplingParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn cache_key_override(mut self, key: impl Into<String>) -> Self {
        self.cache_key_override = Some(key.into());
        self
    }

    pub fn build(self) -> CanonicalRequest {
        CanonicalRequest {
            messages: self.messages,
            params: self.params.unwrap_or_default(),
            cache_key_override: self.cache_key_override,
        }
    }
}

/// Token accounting reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Accumulate usage across calls (swarm aggregation).
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural completion (model decided to stop)
    Stop,

    /// Hit max_tokens limit
    Length,

    /// Blocked by content filter
    ContentFilter,
}

/// Provider-agnostic response. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalResponse {
    /// Generated text
    pub content: String,

    /// Token usage stats
    pub usage: TokenUsage,

    /// Provider that produced this response
    pub provider: ProviderId,

    /// Model used (e.g. "claude-sonnet-4-5", "llama3.2")
    pub model: String,

    /// Whether this response was served from the cache
    pub cached: bool,

    /// Wall-clock latency of the producing call. Zero when the adapter
    /// constructs the response; the executor stamps the measured value.
    pub latency: Duration,

    /// Why generation stopped
    pub finish_reason: FinishReason,
}

/// Domain interface for LLM backend adapters.
///
/// Adapters translate exactly one backend protocol into the canonical
/// contract. They perform no caching and no retry; that is layered above in
/// the resilience executor. Backend status codes MUST map onto the five
/// adapter-level variants of [`GatewayError`] (see `domain::error`).
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable identifier used for circuit/limiter bucketing and response
    /// tagging. Must be cheap.
    fn identifier(&self) -> ProviderId;

    /// Model this adapter targets, used for cache-key derivation.
    fn model(&self) -> &str;

    /// Execute one canonical request against the backend.
    async fn execute(&self, request: &CanonicalRequest) -> Result<CanonicalResponse, GatewayError>;

    /// Check if the backend is healthy and accessible.
    async fn health_check(&self) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_sampling_params() {
        let request = CanonicalRequest::builder()
            .message(Message::user("hello"))
            .build();

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.params.temperature, Some(0.7));
        assert!(request.cache_key_override.is_none());
    }

    #[test]
    fn token_usage_accumulates() {
        let mut total = TokenUsage::default();
        total.add(&TokenUsage { prompt_tokens: 10, completion_tokens: 20, total_tokens: 30 });
        total.add(&TokenUsage { prompt_tokens: 1, completion_tokens: 2, total_tokens: 3 });

        assert_eq!(total.total_tokens, 33);
        assert_eq!(total.prompt_tokens, 11);
    }
}
