// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Error Taxonomy
//
// The single error vocabulary shared by adapters, executor, cache, and
// swarm orchestration. Adapters map backend status codes onto the first
// five variants; the executor adds ProviderUnavailable (circuit open),
// Timeout, and Cancelled. No backend-specific error type crosses this
// boundary.

use crate::domain::llm::ProviderId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Canonical error kinds for gateway calls.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum GatewayError {
    /// Connection reset, DNS failure, or other transport-level fault. Retryable.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Credentials rejected by the backend. Fatal, never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Backend or local token bucket refused the call. Retryable with
    /// backoff, or an immediate failure when the limiter is configured
    /// fail-fast.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The request itself is malformed. Fatal, never retried.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Backend 5xx or unparseable response. Retryable.
    #[error("provider internal error: {0}")]
    ProviderInternal(String),

    /// Circuit for this provider is open; the adapter was never called.
    #[error("provider '{provider}' unavailable: circuit open")]
    ProviderUnavailable { provider: ProviderId },

    /// The timeout-bounded call did not finish in time. Retryable.
    #[error("call timed out after {limit:?}")]
    Timeout { limit: Duration },

    /// The owning job was cancelled. Terminal, never retried.
    #[error("cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Whether the resilience executor may retry this error within its
    /// attempt budget.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::TransientNetwork(_)
                | GatewayError::ProviderInternal(_)
                | GatewayError::RateLimited(_)
                | GatewayError::Timeout { .. }
        )
    }

    /// Stable kind label used for metrics and job diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::TransientNetwork(_) => "transient_network",
            GatewayError::Authentication(_) => "authentication",
            GatewayError::RateLimited(_) => "rate_limited",
            GatewayError::Validation(_) => "validation",
            GatewayError::ProviderInternal(_) => "provider_internal",
            GatewayError::ProviderUnavailable { .. } => "provider_unavailable",
            GatewayError::Timeout { .. } => "timeout",
            GatewayError::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_matches_taxonomy() {
        assert!(GatewayError::TransientNetwork("reset".into()).is_retryable());
        assert!(GatewayError::ProviderInternal("500".into()).is_retryable());
        assert!(GatewayError::RateLimited("429".into()).is_retryable());
        assert!(GatewayError::Timeout { limit: Duration::from_secs(1) }.is_retryable());

        assert!(!GatewayError::Authentication("bad key".into()).is_retryable());
        assert!(!GatewayError::Validation("empty prompt".into()).is_retryable());
        assert!(!GatewayError::Cancelled.is_retryable());
        assert!(!GatewayError::ProviderUnavailable { provider: "p".into() }.is_retryable());
    }

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(GatewayError::Cancelled.kind(), "cancelled");
        assert_eq!(
            GatewayError::ProviderUnavailable { provider: "anthropic".into() }.kind(),
            "provider_unavailable"
        );
    }
}
