// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Backend adapters implementing the canonical [`ProviderAdapter`] contract.
//!
//! One module per backend protocol. Adapters are interchangeable behind the
//! trait; the resilience executor never knows which one it is calling.
//!
//! [`ProviderAdapter`]: crate::domain::llm::ProviderAdapter

pub mod anthropic;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
