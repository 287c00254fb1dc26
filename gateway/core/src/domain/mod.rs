// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Canonical contract, error taxonomy, cache model, and gateway
//! configuration. No I/O lives here.

pub mod cache;
pub mod circuit;
pub mod config;
pub mod error;
pub mod llm;
