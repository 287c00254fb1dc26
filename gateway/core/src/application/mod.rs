// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Layer
//!
//! The resilience executor and the primitives it composes: per-provider
//! circuit breakers, per-provider token buckets, and the provider registry.

pub mod circuit;
pub mod rate_limit;
pub mod registry;
pub mod resilience;

pub use circuit::CircuitBreakers;
pub use rate_limit::RateLimiters;
pub use registry::ProviderRegistry;
pub use resilience::ResilienceExecutor;
