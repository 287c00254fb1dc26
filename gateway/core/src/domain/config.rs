// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Configuration Types
//
// Defines the configuration schema for an AEGIS gateway instance:
// - Provider configuration (BYOLLM support, "env:VAR" API key indirection)
// - Per-provider resilience parameters (retry, circuit, rate limit, timeout)
// - Two-tier cache budgets and invalidation policy
//
// Loaded once into an immutable value and passed explicitly into the
// executor/orchestrator constructors; never read ad hoc at call time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level immutable gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Backend provider configurations
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

impl GatewayConfig {
    /// Parse a YAML manifest. Cross-field validation (fallback references,
    /// duplicate names) happens here so the core can treat the result as
    /// already validated.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: GatewayConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.name.as_str()) {
                anyhow::bail!("duplicate provider name: {}", provider.name);
            }
        }
        for provider in &self.providers {
            for fallback in &provider.resilience.fallbacks {
                if !seen.contains(fallback.as_str()) {
                    anyhow::bail!(
                        "provider '{}' names unknown fallback '{}'",
                        provider.name,
                        fallback
                    );
                }
            }
        }
        Ok(())
    }
}

/// Configuration for one backend provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name (e.g. "ollama-local", "anthropic")
    pub name: String,

    /// Provider type
    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    /// API endpoint URL. Empty string selects the backend's default
    /// public endpoint.
    #[serde(default)]
    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier sent to the backend
    pub model: String,

    /// Whether this provider is active
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Resilience parameters for calls against this provider
    #[serde(default)]
    pub resilience: ResilienceParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    Anthropic,
    Openai,
    /// OpenAI-compatible APIs (LM Studio, vLLM, etc.)
    OpenaiCompatible,
    Ollama,
}

/// Per-provider resilience parameters consumed by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceParams {
    /// Maximum retry attempts after the initial call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff
    #[serde(with = "humantime_serde", default = "default_backoff_base")]
    pub backoff_base: Duration,

    /// Cap on a single backoff delay
    #[serde(with = "humantime_serde", default = "default_backoff_cap")]
    pub backoff_cap: Duration,

    /// Per-attempt timeout on the adapter call
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    #[serde(default)]
    pub circuit: CircuitParams,

    #[serde(default)]
    pub rate_limit: RateLimitParams,

    /// Ordered fallback chain consulted on terminal failure of this provider
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

impl Default for ResilienceParams {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base: default_backoff_base(),
            backoff_cap: default_backoff_cap(),
            timeout: default_timeout(),
            circuit: CircuitParams::default(),
            rate_limit: RateLimitParams::default(),
            fallbacks: Vec::new(),
        }
    }
}

/// Circuit breaker parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitParams {
    /// Failures within `window` required to open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Rolling window over which failures are counted
    #[serde(with = "humantime_serde", default = "default_window")]
    pub window: Duration,

    /// How long an open circuit rejects calls before allowing a trial
    #[serde(with = "humantime_serde", default = "default_open_duration")]
    pub open_duration: Duration,
}

impl Default for CircuitParams {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            window: default_window(),
            open_duration: default_open_duration(),
        }
    }
}

/// Token bucket parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitParams {
    /// Bucket capacity (burst size)
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Tokens refilled per second
    #[serde(default = "default_refill")]
    pub refill_per_second: u32,

    /// What to do when no token is available
    #[serde(default)]
    pub queue: QueuePolicy,
}

impl Default for RateLimitParams {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_per_second: default_refill(),
            queue: QueuePolicy::default(),
        }
    }
}

/// Behavior when the local token bucket is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "policy")]
pub enum QueuePolicy {
    /// Fail immediately with a rate-limited error
    FailFast,
    /// Wait up to `max_queue_delay` for a token, then fail
    Wait {
        #[serde(with = "humantime_serde")]
        max_queue_delay: Duration,
    },
}

impl Default for QueuePolicy {
    fn default() -> Self {
        QueuePolicy::Wait { max_queue_delay: Duration::from_secs(2) }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Tier 1 entry budget
    #[serde(default = "default_tier1_entries")]
    pub tier1_max_entries: usize,

    /// Tier 1 byte budget
    #[serde(default = "default_tier1_bytes")]
    pub tier1_max_bytes: usize,

    /// Default TTL for entries written by the executor
    #[serde(with = "humantime_serde", default = "default_ttl")]
    pub default_ttl: Duration,

    /// Tier 2 sled database path; None disables the persistent tier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier2_path: Option<PathBuf>,

    /// What happens to cached entries when a provider's circuit opens
    #[serde(default)]
    pub invalidation: CacheInvalidationPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tier1_max_entries: default_tier1_entries(),
            tier1_max_bytes: default_tier1_bytes(),
            default_ttl: default_ttl(),
            tier2_path: None,
            invalidation: CacheInvalidationPolicy::default(),
        }
    }
}

/// Cache behavior on circuit-open, set per deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheInvalidationPolicy {
    /// Keep serving cached entries while the backend is down (stale-while-revalidate)
    #[default]
    Keep,
    /// Drop the failing provider's entries when its circuit opens
    DropOnCircuitOpen,
}

fn default_true() -> bool {
    true
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base() -> Duration {
    Duration::from_millis(200)
}
fn default_backoff_cap() -> Duration {
    Duration::from_secs(10)
}
fn default_timeout() -> Duration {
    Duration::from_secs(60)
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_window() -> Duration {
    Duration::from_secs(60)
}
fn default_open_duration() -> Duration {
    Duration::from_secs(30)
}
fn default_capacity() -> u32 {
    60
}
fn default_refill() -> u32 {
    10
}
fn default_tier1_entries() -> usize {
    1024
}
fn default_tier1_bytes() -> usize {
    64 * 1024 * 1024
}
fn default_ttl() -> Duration {
    Duration::from_secs(3600)
}
