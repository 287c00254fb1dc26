// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Per-Provider Circuit Breakers
//
// Each provider's circuit is an independently guarded cell; unrelated
// providers never serialize against each other. Failures are counted over a
// rolling window; OPEN admits exactly one HALF_OPEN trial after the open
// duration elapses.

use crate::domain::circuit::CircuitState;
use crate::domain::config::CircuitParams;
use crate::domain::error::GatewayError;
use crate::domain::llm::ProviderId;
use crate::infrastructure::observability::MetricsRecorder;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// How a call was admitted through the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Normal closed-circuit admission.
    Normal,
    /// The single half-open trial call.
    Trial,
}

struct CircuitCell {
    params: CircuitParams,
    state: CircuitState,
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl CircuitCell {
    fn new(params: CircuitParams) -> Self {
        Self {
            params,
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            opened_at: None,
            trial_in_flight: false,
        }
    }

    fn prune_window(&mut self, now: Instant) {
        while let Some(oldest) = self.failures.front() {
            if now.duration_since(*oldest) > self.params.window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Registry of per-provider circuit state, mutated only by the executor.
pub struct CircuitBreakers {
    cells: DashMap<ProviderId, Arc<Mutex<CircuitCell>>>,
    recorder: Arc<MetricsRecorder>,
}

impl CircuitBreakers {
    pub fn new(recorder: Arc<MetricsRecorder>) -> Self {
        Self { cells: DashMap::new(), recorder }
    }

    /// Register a provider's circuit at adapter registration time.
    /// Re-registration keeps existing state.
    pub fn register(&self, provider: ProviderId, params: CircuitParams) {
        self.cells
            .entry(provider)
            .or_insert_with(|| Arc::new(Mutex::new(CircuitCell::new(params))));
    }

    /// Admission check. Fails fast with `ProviderUnavailable` while open;
    /// transitions OPEN → HALF_OPEN once the open duration has elapsed and
    /// admits exactly one trial.
    pub fn check(&self, provider: &ProviderId) -> Result<Admission, GatewayError> {
        let cell = self.cell(provider);
        let mut cell = cell.lock();
        let now = Instant::now();

        match cell.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let elapsed = cell
                    .opened_at
                    .map(|at| now.duration_since(at))
                    .unwrap_or_default();
                if elapsed >= cell.params.open_duration {
                    cell.state = CircuitState::HalfOpen;
                    cell.trial_in_flight = true;
                    self.recorder.record_circuit_transition(
                        provider,
                        CircuitState::Open,
                        CircuitState::HalfOpen,
                    );
                    Ok(Admission::Trial)
                } else {
                    Err(GatewayError::ProviderUnavailable { provider: provider.clone() })
                }
            }
            CircuitState::HalfOpen => {
                if cell.trial_in_flight {
                    Err(GatewayError::ProviderUnavailable { provider: provider.clone() })
                } else {
                    // Trial slot free again (previous trial resolved without
                    // a transition, which only happens on a lost race).
                    cell.trial_in_flight = true;
                    Ok(Admission::Trial)
                }
            }
        }
    }

    /// Record a successful call. A successful trial closes the circuit and
    /// resets the failure window; a normal success leaves the window alone.
    pub fn record_success(&self, provider: &ProviderId, admission: Admission) {
        let cell = self.cell(provider);
        let mut cell = cell.lock();

        if admission == Admission::Trial && cell.state == CircuitState::HalfOpen {
            cell.state = CircuitState::Closed;
            cell.failures.clear();
            cell.opened_at = None;
            cell.trial_in_flight = false;
            self.recorder.record_circuit_transition(
                provider,
                CircuitState::HalfOpen,
                CircuitState::Closed,
            );
        }
    }

    /// Record a failed call. Returns true when this failure opened the
    /// circuit, so the executor can apply the cache invalidation policy.
    pub fn record_failure(&self, provider: &ProviderId, admission: Admission) -> bool {
        let cell = self.cell(provider);
        let mut cell = cell.lock();
        let now = Instant::now();

        cell.prune_window(now);
        cell.failures.push_back(now);

        match cell.state {
            CircuitState::HalfOpen if admission == Admission::Trial => {
                cell.state = CircuitState::Open;
                cell.opened_at = Some(now);
                cell.trial_in_flight = false;
                self.recorder.record_circuit_transition(
                    provider,
                    CircuitState::HalfOpen,
                    CircuitState::Open,
                );
                true
            }
            CircuitState::Closed if cell.failures.len() as u32 >= cell.params.failure_threshold => {
                cell.state = CircuitState::Open;
                cell.opened_at = Some(now);
                warn!(provider = %provider, failures = cell.failures.len(), "circuit opened");
                self.recorder.record_circuit_transition(
                    provider,
                    CircuitState::Closed,
                    CircuitState::Open,
                );
                true
            }
            _ => false,
        }
    }

    pub fn state(&self, provider: &ProviderId) -> CircuitState {
        self.cell(provider).lock().state
    }

    fn cell(&self, provider: &ProviderId) -> Arc<Mutex<CircuitCell>> {
        self.cells
            .entry(provider.clone())
            .or_insert_with(|| Arc::new(Mutex::new(CircuitCell::new(CircuitParams::default()))))
            .clone()
    }
}
