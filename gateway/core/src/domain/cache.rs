// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Content-Addressed Cache Keys and Entries
//
// A CacheKey is a stable SHA-256 over the normalized message sequence, the
// model identifier, and every sampling parameter that affects output.
// Tracing/metadata fields never enter the hash. Entries are replaced, never
// mutated in place.

use crate::domain::llm::{CanonicalRequest, CanonicalResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// Content-addressed cache key (hex-encoded SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a request against a specific model.
    ///
    /// Honors `cache_key_override` when present. Field values are hashed
    /// with explicit length prefixes and tag bytes so that no two distinct
    /// requests can collapse onto the same byte stream.
    pub fn derive(request: &CanonicalRequest, model: &str) -> Self {
        if let Some(key) = &request.cache_key_override {
            return Self(key.clone());
        }

        let mut hasher = Sha256::new();

        for message in &request.messages {
            hasher.update([0x01]);
            hasher.update(message.role.as_str().as_bytes());
            hasher.update((message.content.len() as u64).to_le_bytes());
            hasher.update(message.content.as_bytes());
        }

        hasher.update([0x02]);
        hasher.update((model.len() as u64).to_le_bytes());
        hasher.update(model.as_bytes());

        // Sampling parameters: bit patterns keep float hashing stable.
        let params = &request.params;
        hasher.update([0x03]);
        hasher.update(params.temperature.map_or(u32::MAX, f32::to_bits).to_le_bytes());
        hasher.update(params.top_p.map_or(u32::MAX, f32::to_bits).to_le_bytes());
        hasher.update(params.max_tokens.unwrap_or(u32::MAX).to_le_bytes());
        if let Some(stops) = &params.stop_sequences {
            for stop in stops {
                hasher.update([0x04]);
                hasher.update((stop.len() as u64).to_le_bytes());
                hasher.update(stop.as_bytes());
            }
        }

        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cached response. Created on miss + successful call, evicted by TTL
/// or LRU pressure, never updated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub response: CanonicalResponse,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
    /// Approximate in-memory footprint, used for the byte budget.
    pub size_bytes: usize,
    pub access_count: u64,
}

impl CacheEntry {
    pub fn new(key: CacheKey, response: CanonicalResponse, ttl: Duration) -> Self {
        // Content dominates entry size; struct overhead is a rounding error
        // against multi-KB completions.
        let size_bytes = response.content.len() + response.model.len() + key.as_str().len() + 128;
        Self {
            key,
            response,
            created_at: Utc::now(),
            ttl,
            size_bytes,
            access_count: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => age > ttl,
            Err(_) => false, // TTL too large to represent: effectively immortal
        }
    }
}
