// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Layer
//!
//! The orchestrator and the role registry that parameterizes it.

pub mod orchestrator;
pub mod roles;

pub use orchestrator::SwarmOrchestrator;
pub use roles::{RoleBinding, RoleRegistry};
