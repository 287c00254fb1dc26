// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `aegis-gateway-core`: Provider Gateway Primitives
//!
//! Sits between application callers and interchangeable, unreliable LLM
//! backends. Translates each backend's protocol into one canonical contract
//! and shields callers from backend flakiness.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | Canonical request/response, error taxonomy, cache model, configuration |
//! | [`infrastructure`] | Infrastructure | Backend adapters, two-tier cache, metrics recorder, templates |
//! | [`application`] | Application | Resilience executor, circuit breakers, rate limiters, registry |
//!
//! ## Key Concepts
//!
//! - **Canonical contract**: every adapter maps its backend onto
//!   [`domain::llm::CanonicalRequest`]/[`domain::llm::CanonicalResponse`] and
//!   the fixed error taxonomy in [`domain::error`]. Nothing backend-specific
//!   leaks past an adapter.
//! - **Resilience executor**: one adapter call wrapped with rate limiting,
//!   circuit breaking, a per-attempt timeout, and retry with jittered
//!   exponential backoff.
//! - **Two-tier cache**: content-addressed responses in a bounded in-memory
//!   LRU backed by an optional persistent store.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{ProviderRegistry, ResilienceExecutor};
pub use domain::cache::{CacheEntry, CacheKey};
pub use domain::circuit::CircuitState;
pub use domain::config::{CacheInvalidationPolicy, GatewayConfig, ResilienceParams};
pub use domain::error::GatewayError;
pub use domain::llm::{
    CanonicalRequest, CanonicalResponse, FinishReason, Message, MessageRole, ProviderAdapter,
    ProviderId, SamplingParams, TokenUsage,
};
pub use infrastructure::cache::{PersistentStore, ResponseCache, SledStore};
pub use infrastructure::observability::{MetricsRecorder, MetricsSnapshot};
pub use infrastructure::template::TemplateEngine;
