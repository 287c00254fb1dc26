// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Two-Tier Response Cache
//
// Tier 1: bounded in-memory LRU (entry count + byte budget, TTL on read).
// Tier 2: persistent store behind the PersistentStore trait; hits there are
// promoted into tier 1. Last writer wins on duplicate puts for the same key.
// Tier 2 may lag tier 1; no cross-tier consistency is promised.

pub mod tier2;

use crate::domain::cache::{CacheEntry, CacheKey};
use crate::domain::config::CacheConfig;
use crate::domain::llm::{CanonicalResponse, ProviderId};
use crate::infrastructure::observability::{CacheEventKind, MetricsRecorder};
use chrono::Utc;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use tier2::{PersistentStore, SledStore};

struct Tier1 {
    map: LruCache<CacheKey, CacheEntry>,
    bytes: usize,
}

impl Tier1 {
    /// Insert with LRU + byte-budget eviction. Returns keys evicted to make
    /// room, so the caller can count them without holding the lock.
    fn insert(&mut self, entry: CacheEntry, max_bytes: usize) -> Vec<CacheKey> {
        let mut evicted = Vec::new();
        let key = entry.key.clone();
        self.bytes += entry.size_bytes;

        if let Some((old_key, old_entry)) = self.map.push(key.clone(), entry) {
            self.bytes = self.bytes.saturating_sub(old_entry.size_bytes);
            // push returns the replaced value for the same key, or the
            // LRU-evicted pair when at capacity.
            if old_key != key {
                evicted.push(old_key);
            }
        }

        while self.bytes > max_bytes {
            match self.map.pop_lru() {
                Some((lru_key, lru_entry)) => {
                    self.bytes = self.bytes.saturating_sub(lru_entry.size_bytes);
                    evicted.push(lru_key);
                }
                None => break,
            }
        }

        evicted
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.map.pop(key)?;
        self.bytes = self.bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }
}

/// Content-addressed response cache shared by all concurrently running
/// sub-tasks and jobs.
pub struct ResponseCache {
    tier1: Mutex<Tier1>,
    tier1_max_bytes: usize,
    tier2: Option<Arc<dyn PersistentStore>>,
    default_ttl: Duration,
    recorder: Arc<MetricsRecorder>,
}

impl ResponseCache {
    /// Build from configuration, opening the sled tier when a path is set.
    pub fn new(config: &CacheConfig, recorder: Arc<MetricsRecorder>) -> anyhow::Result<Self> {
        let tier2: Option<Arc<dyn PersistentStore>> = match &config.tier2_path {
            Some(path) => Some(Arc::new(SledStore::open(path)?)),
            None => None,
        };
        Ok(Self::with_store(config, recorder, tier2))
    }

    /// Build with an explicit (or absent) tier-2 store.
    pub fn with_store(
        config: &CacheConfig,
        recorder: Arc<MetricsRecorder>,
        tier2: Option<Arc<dyn PersistentStore>>,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.tier1_max_entries.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            tier1: Mutex::new(Tier1 { map: LruCache::new(capacity), bytes: 0 }),
            tier1_max_bytes: config.tier1_max_bytes,
            tier2,
            default_ttl: config.default_ttl,
            recorder,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Probe tier 1 then tier 2. A tier-2 hit is promoted into tier 1.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = Utc::now();

        enum Probe {
            Hit(CacheEntry),
            Expired,
            Absent,
        }

        {
            let mut tier1 = self.tier1.lock();
            let probe = match tier1.map.get_mut(key) {
                None => Probe::Absent,
                Some(entry) if entry.is_expired(now) => Probe::Expired,
                Some(entry) => {
                    entry.access_count += 1;
                    Probe::Hit(entry.clone())
                }
            };
            match probe {
                Probe::Hit(hit) => {
                    drop(tier1);
                    self.recorder.record_cache_event(key, CacheEventKind::Hit);
                    self.publish_occupancy();
                    return Some(hit);
                }
                Probe::Expired => {
                    tier1.remove(key);
                    drop(tier1);
                    self.recorder.record_cache_event(key, CacheEventKind::Evict);
                }
                Probe::Absent => {}
            }
        }

        if let Some(store) = &self.tier2 {
            if let Some(bytes) = store.get(key).await {
                match bincode::deserialize::<CacheEntry>(&bytes) {
                    Ok(mut entry) => {
                        if entry.is_expired(now) {
                            store.delete(key).await;
                            self.recorder.record_cache_event(key, CacheEventKind::Evict);
                        } else {
                            entry.access_count += 1;
                            let evicted = {
                                let mut tier1 = self.tier1.lock();
                                tier1.insert(entry.clone(), self.tier1_max_bytes)
                            };
                            for evicted_key in &evicted {
                                self.recorder.record_cache_event(evicted_key, CacheEventKind::Evict);
                            }
                            self.recorder.record_cache_event(key, CacheEventKind::Promote);
                            self.recorder.record_cache_event(key, CacheEventKind::Hit);
                            self.publish_occupancy();
                            return Some(entry);
                        }
                    }
                    Err(e) => {
                        // Corrupt tier-2 value: drop it rather than fail the request.
                        warn!(key = %key, error = %e, "dropping undecodable tier-2 entry");
                        store.delete(key).await;
                    }
                }
            }
        }

        self.recorder.record_cache_event(key, CacheEventKind::Miss);
        None
    }

    /// Store a response in both tiers. Last writer wins for duplicate keys.
    pub async fn put(&self, key: CacheKey, response: CanonicalResponse, ttl: Duration) {
        let entry = CacheEntry::new(key.clone(), response, ttl);

        let evicted = {
            let mut tier1 = self.tier1.lock();
            tier1.insert(entry.clone(), self.tier1_max_bytes)
        };
        for evicted_key in &evicted {
            self.recorder.record_cache_event(evicted_key, CacheEventKind::Evict);
        }

        if let Some(store) = &self.tier2 {
            match bincode::serialize(&entry) {
                Ok(bytes) => store.put(&key, bytes, ttl).await,
                Err(e) => warn!(key = %key, error = %e, "failed to encode entry for tier 2"),
            }
        }

        self.publish_occupancy();
    }

    /// Remove a key from both tiers.
    pub async fn invalidate(&self, key: &CacheKey) {
        let removed = self.tier1.lock().remove(key).is_some();
        if removed {
            self.recorder.record_cache_event(key, CacheEventKind::Evict);
        }
        if let Some(store) = &self.tier2 {
            store.delete(key).await;
        }
        self.publish_occupancy();
    }

    /// Drop all entries produced by one provider. Used by the
    /// drop-on-circuit-open invalidation policy. Tier-2 removal is best
    /// effort over the keys currently resident in tier 1.
    pub async fn invalidate_provider(&self, provider: &ProviderId) {
        let keys: Vec<CacheKey> = {
            let tier1 = self.tier1.lock();
            tier1
                .map
                .iter()
                .filter(|(_, entry)| entry.response.provider == *provider)
                .map(|(key, _)| key.clone())
                .collect()
        };

        debug!(provider = %provider, count = keys.len(), "invalidating provider cache entries");
        for key in &keys {
            self.invalidate(key).await;
        }
    }

    /// Current tier-1 occupancy (entries, bytes).
    pub fn occupancy(&self) -> (usize, usize) {
        let tier1 = self.tier1.lock();
        (tier1.map.len(), tier1.bytes)
    }

    fn publish_occupancy(&self) {
        let (entries, bytes) = self.occupancy();
        self.recorder.set_cache_occupancy(entries, bytes);
    }
}
