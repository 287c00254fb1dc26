// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Resilience Executor
//
// Wraps one adapter call with, in order: cache probe, token-bucket rate
// limit, circuit-breaker check, timeout-bounded call, retry with
// exponential backoff and jitter, and circuit bookkeeping. Retries are
// invisible to the caller; only the final exhausted error crosses this
// boundary. On terminal failure of the primary provider the configured
// fallback chain is walked in order.

use crate::application::circuit::CircuitBreakers;
use crate::application::rate_limit::RateLimiters;
use crate::application::registry::{ProviderRegistry, RegisteredProvider};
use crate::domain::cache::CacheKey;
use crate::domain::config::{CacheInvalidationPolicy, ResilienceParams};
use crate::domain::error::GatewayError;
use crate::domain::llm::{CanonicalRequest, CanonicalResponse, ProviderId};
use crate::infrastructure::cache::ResponseCache;
use crate::infrastructure::observability::MetricsRecorder;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The unit of reliability: one adapter call under full resilience
/// treatment. Shared by swarm sub-tasks and synthesis calls alike.
pub struct ResilienceExecutor {
    registry: Arc<ProviderRegistry>,
    circuits: CircuitBreakers,
    limiters: RateLimiters,
    cache: Arc<ResponseCache>,
    recorder: Arc<MetricsRecorder>,
    invalidation: CacheInvalidationPolicy,
}

impl ResilienceExecutor {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<ResponseCache>,
        recorder: Arc<MetricsRecorder>,
        invalidation: CacheInvalidationPolicy,
    ) -> Self {
        let circuits = CircuitBreakers::new(Arc::clone(&recorder));
        let limiters = RateLimiters::new();
        for (id, registered) in registry.iter() {
            circuits.register(id.clone(), registered.params.circuit.clone());
            limiters.register(id.clone(), &registered.params.rate_limit);
        }

        Self { registry, circuits, limiters, cache, recorder, invalidation }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn recorder(&self) -> &Arc<MetricsRecorder> {
        &self.recorder
    }

    /// Execute one canonical request against a provider (and its fallback
    /// chain), cache-first.
    pub async fn execute(
        &self,
        provider: &ProviderId,
        request: &CanonicalRequest,
    ) -> Result<CanonicalResponse, GatewayError> {
        let primary = self.registry.get(provider).ok_or_else(|| {
            GatewayError::Validation(format!("unknown provider '{provider}'"))
        })?;

        // Cache is keyed by the requested route: repeated identical requests
        // hit regardless of which chain member ends up serving them.
        let key = CacheKey::derive(request, primary.adapter.model());
        if let Some(entry) = self.cache.get(&key).await {
            let mut response = entry.response;
            response.cached = true;
            return Ok(response);
        }

        let mut chain = vec![provider.clone()];
        chain.extend(primary.params.fallbacks.iter().map(|id| ProviderId::new(id.clone())));

        let mut last_error = None;
        for (position, candidate) in chain.iter().enumerate() {
            let Some(registered) = self.registry.get(candidate) else {
                warn!(provider = %candidate, "fallback names unregistered provider, skipping");
                continue;
            };
            if position > 0 {
                debug!(from = %provider, to = %candidate, "falling back");
            }

            match self.execute_with_retries(candidate, registered, request).await {
                Ok(response) => {
                    self.cache
                        .put(key.clone(), response.clone(), self.cache.default_ttl())
                        .await;
                    return Ok(response);
                }
                // Malformed input fails everywhere; cancellation must not
                // spill onto other backends.
                Err(error @ (GatewayError::Validation(_) | GatewayError::Cancelled)) => {
                    return Err(error);
                }
                Err(error) => {
                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GatewayError::Validation("no providers available".into())))
    }

    /// Current circuit state, exposed for the metrics pull interface.
    pub fn circuit_state(&self, provider: &ProviderId) -> crate::domain::circuit::CircuitState {
        self.circuits.state(provider)
    }

    async fn execute_with_retries(
        &self,
        provider: &ProviderId,
        registered: &RegisteredProvider,
        request: &CanonicalRequest,
    ) -> Result<CanonicalResponse, GatewayError> {
        let params = &registered.params;
        let mut attempt: u32 = 0;

        loop {
            // Rate limit first: a queued-out call never touches the circuit.
            self.limiters.acquire(provider).await?;
            let admission = self.circuits.check(provider)?;

            let start = Instant::now();
            let outcome =
                match tokio::time::timeout(params.timeout, registered.adapter.execute(request))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(GatewayError::Timeout { limit: params.timeout }),
                };
            let latency = start.elapsed();

            match outcome {
                Ok(mut response) => {
                    self.circuits.record_success(provider, admission);
                    self.recorder
                        .record_attempt(provider, Ok(()), latency, Some(&response.usage));
                    response.latency = latency;
                    response.cached = false;
                    return Ok(response);
                }
                Err(error) => {
                    self.recorder.record_attempt(provider, Err(&error), latency, None);
                    let opened = self.circuits.record_failure(provider, admission);
                    if opened && self.invalidation == CacheInvalidationPolicy::DropOnCircuitOpen {
                        self.cache.invalidate_provider(provider).await;
                    }

                    if !error.is_retryable() || attempt >= params.max_retries {
                        return Err(error);
                    }

                    let delay = backoff_delay(params, attempt);
                    warn!(
                        provider = %provider,
                        attempt = attempt + 1,
                        max_retries = params.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// `base * 2^attempt`, capped, plus uniform jitter of up to a quarter of the
/// capped delay to avoid synchronized retries.
fn backoff_delay(params: &ResilienceParams, attempt: u32) -> Duration {
    let exponential = params
        .backoff_base
        .saturating_mul(2u32.saturating_pow(attempt));
    let capped = exponential.min(params.backoff_cap);

    let jitter_budget_ms = capped.as_millis() as u64 / 4;
    let jitter_ms = if jitter_budget_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=jitter_budget_ms)
    };

    capped + Duration::from_millis(jitter_ms)
}
