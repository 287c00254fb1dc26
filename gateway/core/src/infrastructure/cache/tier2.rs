// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Tier-2 Persistence Boundary
//
// The core only requires get/put/delete semantics from the persistent tier;
// the storage format is the store's concern. Failures are swallowed and
// logged here because tier 2 is allowed to lag (no strong consistency with
// tier 1 is promised).

use crate::domain::cache::CacheKey;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// External collaborator contract for the persistent cache tier.
///
/// The `ttl` on `put` is advisory for stores with native expiry; the cached
/// entry itself carries its creation time and TTL, and the reading side
/// re-checks expiry after decoding.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<Vec<u8>>;
    async fn put(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration);
    async fn delete(&self, key: &CacheKey);
}

/// Default tier-2 store backed by an embedded sled database.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }
}

#[async_trait]
impl PersistentStore for SledStore {
    async fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        match self.db.get(key.as_bytes()) {
            Ok(value) => value.map(|ivec| ivec.to_vec()),
            Err(e) => {
                warn!(key = %key, error = %e, "tier-2 read failed");
                None
            }
        }
    }

    async fn put(&self, key: &CacheKey, value: Vec<u8>, _ttl: Duration) {
        if let Err(e) = self.db.insert(key.as_bytes(), value) {
            warn!(key = %key, error = %e, "tier-2 write failed");
        }
    }

    async fn delete(&self, key: &CacheKey) {
        if let Err(e) = self.db.remove(key.as_bytes()) {
            warn!(key = %key, error = %e, "tier-2 delete failed");
        }
    }
}
