// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Metrics Recorder - Structured Attempt/Outcome Sink
//
// Pure sink consumed by every layer above it. Emits through the `metrics`
// facade (Prometheus export is the host's concern) and aggregates an
// internal snapshot for the pull interface and for tests.
//
// Recording must never abort the caller's request: every record path is
// wrapped so a panic inside the metrics backend is swallowed and counted.

use crate::domain::cache::CacheKey;
use crate::domain::circuit::CircuitState;
use crate::domain::error::GatewayError;
use crate::domain::llm::{ProviderId, TokenUsage};
use dashmap::DashMap;
use metrics::{counter, gauge, histogram};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cache event kinds reported by the cache layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    Hit,
    Miss,
    Evict,
    /// Tier-2 hit promoted into tier 1
    Promote,
}

impl CacheEventKind {
    fn label(&self) -> &'static str {
        match self {
            CacheEventKind::Hit => "hit",
            CacheEventKind::Miss => "miss",
            CacheEventKind::Evict => "evict",
            CacheEventKind::Promote => "promote",
        }
    }
}

#[derive(Default)]
struct ProviderAgg {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: DashMap<&'static str, u64>,
    latency_micros: AtomicU64,
    latency_count: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    circuit_state: AtomicU8,
}

#[derive(Default)]
struct CacheAgg {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    promotions: AtomicU64,
    occupancy_entries: AtomicUsize,
    occupancy_bytes: AtomicUsize,
}

/// Aggregated metrics view returned by [`MetricsRecorder::snapshot`].
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub providers: HashMap<String, ProviderMetrics>,
    pub cache: CacheMetrics,
    /// Records that failed to land (recorder never surfaces these as errors)
    pub dropped: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderMetrics {
    pub attempts: u64,
    pub successes: u64,
    pub failures_by_kind: HashMap<String, u64>,
    pub latency_total: Duration,
    pub latency_count: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub circuit_state: CircuitState,
}

impl ProviderMetrics {
    pub fn failures(&self) -> u64 {
        self.failures_by_kind.values().sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub promotions: u64,
    pub occupancy_entries: usize,
    pub occupancy_bytes: usize,
}

/// Structured attempt/outcome sink shared by executor, cache, and circuits.
#[derive(Default)]
pub struct MetricsRecorder {
    providers: DashMap<String, Arc<ProviderAgg>>,
    cache: CacheAgg,
    dropped: AtomicU64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one adapter-call attempt. `outcome` is `Ok` for a success,
    /// `Err` carries the canonical error for failure-by-kind counting.
    pub fn record_attempt(
        &self,
        provider: &ProviderId,
        outcome: Result<(), &GatewayError>,
        latency: Duration,
        usage: Option<&TokenUsage>,
    ) {
        self.guarded(|| {
            let agg = self.provider_agg(provider);
            agg.attempts.fetch_add(1, Ordering::Relaxed);
            agg.latency_micros
                .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
            agg.latency_count.fetch_add(1, Ordering::Relaxed);

            let outcome_label = match outcome {
                Ok(()) => {
                    agg.successes.fetch_add(1, Ordering::Relaxed);
                    "success"
                }
                Err(error) => {
                    *agg.failures.entry(error.kind()).or_insert(0) += 1;
                    error.kind()
                }
            };

            if let Some(usage) = usage {
                agg.prompt_tokens
                    .fetch_add(u64::from(usage.prompt_tokens), Ordering::Relaxed);
                agg.completion_tokens
                    .fetch_add(u64::from(usage.completion_tokens), Ordering::Relaxed);
                counter!("gateway_tokens_total", "provider" => provider.0.clone(), "direction" => "completion")
                    .increment(u64::from(usage.completion_tokens));
                counter!("gateway_tokens_total", "provider" => provider.0.clone(), "direction" => "prompt")
                    .increment(u64::from(usage.prompt_tokens));
            }

            counter!("gateway_attempts_total", "provider" => provider.0.clone(), "outcome" => outcome_label)
                .increment(1);
            histogram!("gateway_attempt_latency_seconds", "provider" => provider.0.clone())
                .record(latency.as_secs_f64());
        });
    }

    /// Record a circuit transition and update the per-provider gauge.
    pub fn record_circuit_transition(
        &self,
        provider: &ProviderId,
        from: CircuitState,
        to: CircuitState,
    ) {
        self.guarded(|| {
            debug!(provider = %provider, %from, %to, "circuit transition");
            let agg = self.provider_agg(provider);
            agg.circuit_state.store(to.as_gauge(), Ordering::Relaxed);

            counter!(
                "gateway_circuit_transitions_total",
                "provider" => provider.0.clone(),
                "from" => from.to_string(),
                "to" => to.to_string()
            )
            .increment(1);
            gauge!("gateway_circuit_state", "provider" => provider.0.clone())
                .set(f64::from(to.as_gauge()));
        });
    }

    /// Record a cache event for a key.
    pub fn record_cache_event(&self, key: &CacheKey, event: CacheEventKind) {
        self.guarded(|| {
            debug!(key = %key, event = event.label(), "cache event");
            let counter_ref = match event {
                CacheEventKind::Hit => &self.cache.hits,
                CacheEventKind::Miss => &self.cache.misses,
                CacheEventKind::Evict => &self.cache.evictions,
                CacheEventKind::Promote => &self.cache.promotions,
            };
            counter_ref.fetch_add(1, Ordering::Relaxed);
            counter!("gateway_cache_events_total", "event" => event.label()).increment(1);
        });
    }

    /// Update the cache occupancy gauges. Called by the cache after every
    /// mutation; cheap enough to be unconditional.
    pub fn set_cache_occupancy(&self, entries: usize, bytes: usize) {
        self.guarded(|| {
            self.cache.occupancy_entries.store(entries, Ordering::Relaxed);
            self.cache.occupancy_bytes.store(bytes, Ordering::Relaxed);
            gauge!("gateway_cache_entries").set(entries as f64);
            gauge!("gateway_cache_bytes").set(bytes as f64);
        });
    }

    /// Aggregated counters/histogram-sums/gauges for the pull interface.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut providers = HashMap::new();
        for entry in self.providers.iter() {
            let agg = entry.value();
            let failures_by_kind = agg
                .failures
                .iter()
                .map(|kv| (kv.key().to_string(), *kv.value()))
                .collect();
            providers.insert(
                entry.key().clone(),
                ProviderMetrics {
                    attempts: agg.attempts.load(Ordering::Relaxed),
                    successes: agg.successes.load(Ordering::Relaxed),
                    failures_by_kind,
                    latency_total: Duration::from_micros(agg.latency_micros.load(Ordering::Relaxed)),
                    latency_count: agg.latency_count.load(Ordering::Relaxed),
                    prompt_tokens: agg.prompt_tokens.load(Ordering::Relaxed),
                    completion_tokens: agg.completion_tokens.load(Ordering::Relaxed),
                    circuit_state: CircuitState::from_gauge(
                        agg.circuit_state.load(Ordering::Relaxed),
                    ),
                },
            );
        }

        MetricsSnapshot {
            providers,
            cache: CacheMetrics {
                hits: self.cache.hits.load(Ordering::Relaxed),
                misses: self.cache.misses.load(Ordering::Relaxed),
                evictions: self.cache.evictions.load(Ordering::Relaxed),
                promotions: self.cache.promotions.load(Ordering::Relaxed),
                occupancy_entries: self.cache.occupancy_entries.load(Ordering::Relaxed),
                occupancy_bytes: self.cache.occupancy_bytes.load(Ordering::Relaxed),
            },
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn provider_agg(&self, provider: &ProviderId) -> Arc<ProviderAgg> {
        self.providers
            .entry(provider.0.clone())
            .or_default()
            .clone()
    }

    /// Recording is best-effort: a panicking metrics backend must not take
    /// the request down with it.
    fn guarded(&self, record: impl FnOnce()) {
        if std::panic::catch_unwind(AssertUnwindSafe(record)).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}
