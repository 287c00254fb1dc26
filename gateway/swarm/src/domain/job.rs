// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Job Aggregates
//!
//! Core types for fan-out coordination:
//!
//! - Job-level specs and reports: [`TaskSpec`], [`JobOptions`], [`JobReport`].
//! - [`SwarmTask`]: one labeled sub-request with its own lifecycle.
//! - [`JobId`] / [`TaskId`]: UUID newtypes.
//!
//! # Invariants
//!
//! - A task is owned exclusively by the job that created it.
//! - A job's overall status is always recomputed from its tasks via
//!   [`derived_status`]; it is never stored where it could drift.

use aegis_gateway_core::{CanonicalResponse, GatewayError, ProviderId, TokenUsage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a swarm job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a sub-task within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

/// Sub-task lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

/// Job lifecycle. Terminal states are derived from task outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    PartiallyCompleted,
    Failed,
}

/// One labeled sub-request. Owned exclusively by its job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmTask {
    pub id: TaskId,
    /// Role/label the task runs under (e.g. "researcher", "critic").
    pub label: String,
    /// Input payload substituted into the role's prompt template.
    pub payload: String,
    /// Route to this provider instead of the role's default.
    pub provider_override: Option<ProviderId>,
    pub status: TaskStatus,
    pub result: Option<CanonicalResponse>,
    pub error: Option<GatewayError>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SwarmTask {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            id: TaskId::new(),
            label: spec.role,
            payload: spec.payload,
            provider_override: spec.provider_override,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            ended_at: None,
        }
    }
}

/// Caller-facing sub-task descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub role: String,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_override: Option<ProviderId>,
}

impl TaskSpec {
    pub fn new(role: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { role: role.into(), payload: payload.into(), provider_override: None }
    }

    pub fn with_provider(mut self, provider: ProviderId) -> Self {
        self.provider_override = Some(provider);
        self
    }
}

/// How successful sub-task outputs are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// One extra canonical call merges the outputs (default).
    Synthesize,
    /// Local label-prefixed concatenation; no extra model call.
    Concatenate,
}

/// Job-level options supplied at submission.
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Maximum sub-tasks in flight at once.
    pub max_concurrency: usize,
    /// Overall deadline, enforced as a cancellation once it elapses.
    pub deadline: Option<Duration>,
    pub aggregation: AggregationStrategy,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self { max_concurrency: 4, deadline: None, aggregation: AggregationStrategy::Synthesize }
    }
}

/// Diagnostic for one failed sub-task: error kind + normalized message,
/// never backend-internal detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedTask {
    pub label: String,
    pub kind: String,
    pub message: String,
}

/// Final job result handed back to the caller.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub id: JobId,
    pub status: JobStatus,
    /// Whether the job was cancelled (by the caller or its deadline).
    pub cancelled: bool,
    /// Merged output; absent when the job failed outright or synthesis
    /// itself failed.
    pub synthesis: Option<CanonicalResponse>,
    /// Terminal synthesis failure, when the merge call exhausted its budget.
    pub synthesis_error: Option<FailedTask>,
    /// Labels and reasons for every failed sub-task.
    pub failed: Vec<FailedTask>,
    /// Final state of every sub-task, correlated by id/label.
    pub tasks: Vec<SwarmTask>,
    /// Token usage summed over successful sub-tasks and synthesis.
    pub usage: TokenUsage,
    pub elapsed: Duration,
}

/// Job-level errors (submission and lookup; never per-call errors).
#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("job has no sub-tasks")]
    EmptyJob,
}

/// Pure derivation of a job's status from its tasks' statuses.
pub fn derived_status(tasks: &[SwarmTask]) -> JobStatus {
    if tasks.is_empty() {
        return JobStatus::Pending;
    }
    if tasks.iter().all(|t| t.status == TaskStatus::Pending) {
        return JobStatus::Pending;
    }
    if tasks.iter().any(|t| !t.status.is_terminal()) {
        return JobStatus::Running;
    }

    let succeeded = tasks.iter().filter(|t| t.status == TaskStatus::Succeeded).count();
    if succeeded == tasks.len() {
        JobStatus::Completed
    } else if succeeded == 0 {
        JobStatus::Failed
    } else {
        JobStatus::PartiallyCompleted
    }
}
