// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure Layer
//!
//! Backend adapters, the two-tier response cache, the metrics recorder, and
//! the prompt template engine.

pub mod cache;
pub mod llm;
pub mod observability;
pub mod template;
