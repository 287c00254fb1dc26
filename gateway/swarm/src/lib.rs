// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `aegis-gateway-swarm`: Fan-Out Orchestration
//!
//! Decomposes one logical request into concurrent, labeled sub-requests,
//! routes each through the gateway's resilience executor, tolerates partial
//! failure, and merges the successful outputs into one response.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | Job/task aggregates, status derivation, job errors |
//! | [`application`] | Application | Swarm orchestrator, role registry |
//!
//! ## Key Concepts
//!
//! - **Roles, not agents**: a role is a provider binding plus a prompt
//!   template. There is no agent object hierarchy; roles are rows in a
//!   lookup table.
//! - **Partial-failure tolerance**: one failed sub-task never aborts its
//!   siblings. The job completes with whatever succeeded, and the report
//!   names every failure by label and error kind.
//! - **Derived status**: a job's status is always recomputed from its
//!   tasks' states, never stored where it could drift.

pub mod application;
pub mod domain;

pub use application::{RoleBinding, RoleRegistry, SwarmOrchestrator};
pub use domain::job::{
    derived_status, AggregationStrategy, FailedTask, JobError, JobId, JobOptions, JobReport,
    JobStatus, SwarmTask, TaskId, TaskSpec, TaskStatus,
};
