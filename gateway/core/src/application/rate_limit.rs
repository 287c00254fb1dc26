// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Per-Provider Token Buckets
//
// Governor-backed rate limiting, one independently guarded bucket per
// provider. A call either takes a token, waits up to the configured queue
// delay, or fails with a rate-limited error; the limit is never silently
// bypassed.

use crate::domain::config::{QueuePolicy, RateLimitParams};
use crate::domain::error::GatewayError;
use crate::domain::llm::ProviderId;
use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

struct ProviderBucket {
    limiter: DefaultDirectRateLimiter,
    queue: QueuePolicy,
}

/// Registry of per-provider token buckets.
#[derive(Default)]
pub struct RateLimiters {
    buckets: DashMap<ProviderId, Arc<ProviderBucket>>,
}

impl RateLimiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider's bucket. Re-registration keeps the existing
    /// bucket (and its accumulated state).
    pub fn register(&self, provider: ProviderId, params: &RateLimitParams) {
        let refill = NonZeroU32::new(params.refill_per_second.max(1)).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(params.capacity.max(1)).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(refill).allow_burst(burst);
        self.buckets.entry(provider).or_insert_with(|| {
            Arc::new(ProviderBucket { limiter: RateLimiter::direct(quota), queue: params.queue })
        });
    }

    /// Take one token for the provider, honoring its queue policy.
    /// Providers without a registered bucket are unlimited.
    pub async fn acquire(&self, provider: &ProviderId) -> Result<(), GatewayError> {
        let Some(bucket) = self.buckets.get(provider).map(|b| b.clone()) else {
            return Ok(());
        };

        match bucket.queue {
            QueuePolicy::FailFast => bucket.limiter.check().map_err(|_| {
                debug!(provider = %provider, "token bucket empty, failing fast");
                GatewayError::RateLimited(format!("token bucket empty for '{provider}'"))
            }),
            QueuePolicy::Wait { max_queue_delay } => {
                tokio::time::timeout(max_queue_delay, bucket.limiter.until_ready())
                    .await
                    .map_err(|_| {
                        debug!(provider = %provider, "queue delay exhausted waiting for token");
                        GatewayError::RateLimited(format!(
                            "no token for '{provider}' within {max_queue_delay:?}"
                        ))
                    })
            }
        }
    }
}
