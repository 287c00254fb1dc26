// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provider Registry
//
// Maps provider identifiers to adapter instances plus their per-provider
// resilience parameters. Built once from validated configuration (or
// programmatically for embedding and tests) and treated as immutable
// afterwards.

use crate::domain::config::{GatewayConfig, ProviderConfig, ProviderType, ResilienceParams};
use crate::domain::error::GatewayError;
use crate::domain::llm::{ProviderAdapter, ProviderId};
use crate::infrastructure::llm::{AnthropicAdapter, OllamaAdapter, OpenAiAdapter};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// One registered provider: its adapter and its resilience parameters.
pub struct RegisteredProvider {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub params: ResilienceParams,
}

/// Registry of interchangeable backend adapters.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, RegisteredProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration. Providers that fail to
    /// initialize are skipped with a warning so one bad entry does not take
    /// down the rest.
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let mut registry = Self::new();

        info!("initializing provider registry");
        for provider_config in &config.providers {
            if !provider_config.enabled {
                info!(provider = %provider_config.name, "provider disabled, skipping");
                continue;
            }

            match Self::create_adapter(provider_config) {
                Ok(adapter) => {
                    info!(
                        provider = %provider_config.name,
                        model = %provider_config.model,
                        "registered provider"
                    );
                    registry.register(adapter, provider_config.resilience.clone());
                }
                Err(e) => {
                    warn!(provider = %provider_config.name, error = %e, "failed to initialize provider");
                }
            }
        }

        if registry.providers.is_empty() {
            warn!("no providers registered; all gateway calls will fail");
        }

        Ok(registry)
    }

    /// Register an adapter programmatically.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>, params: ResilienceParams) {
        self.providers
            .insert(adapter.identifier(), RegisteredProvider { adapter, params });
    }

    pub fn get(&self, provider: &ProviderId) -> Option<&RegisteredProvider> {
        self.providers.get(provider)
    }

    pub fn contains(&self, provider: &ProviderId) -> bool {
        self.providers.contains_key(provider)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProviderId, &RegisteredProvider)> {
        self.providers.iter()
    }

    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.keys().cloned().collect()
    }

    /// Check health of all registered providers.
    pub async fn health_check_all(&self) -> HashMap<ProviderId, Result<(), GatewayError>> {
        let mut results = HashMap::new();
        for (id, registered) in &self.providers {
            results.insert(id.clone(), registered.adapter.health_check().await);
        }
        results
    }

    fn create_adapter(config: &ProviderConfig) -> anyhow::Result<Arc<dyn ProviderAdapter>> {
        let id = ProviderId::new(config.name.clone());
        let api_key = Self::resolve_api_key(&config.api_key)?;

        let adapter: Arc<dyn ProviderAdapter> = match config.provider_type {
            ProviderType::Anthropic => Arc::new(AnthropicAdapter::new(
                id,
                config.endpoint.clone(),
                api_key,
                config.model.clone(),
            )),
            ProviderType::Openai | ProviderType::OpenaiCompatible => Arc::new(OpenAiAdapter::new(
                id,
                config.endpoint.clone(),
                api_key,
                config.model.clone(),
            )),
            ProviderType::Ollama => {
                let endpoint = if config.endpoint.is_empty() {
                    "http://localhost:11434".to_string()
                } else {
                    config.endpoint.clone()
                };
                Arc::new(OllamaAdapter::new(id, endpoint, config.model.clone()))
            }
        };

        Ok(adapter)
    }

    /// Resolve an API key from config (supports "env:VAR_NAME" syntax).
    fn resolve_api_key(key: &Option<String>) -> anyhow::Result<String> {
        match key {
            Some(k) => match k.strip_prefix("env:") {
                Some(var_name) => std::env::var(var_name)
                    .map_err(|_| anyhow::anyhow!("environment variable not set: {var_name}")),
                None => Ok(k.clone()),
            },
            None => Ok(String::new()), // Local providers without auth
        }
    }
}
