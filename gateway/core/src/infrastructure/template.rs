// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Prompt Template Engine
//
// Handlebars rendering for role prompt templates and the synthesis prompt.
// Templates are referenced by the role registry; their content is the
// caller's concern. This module only substitutes placeholders.

use crate::domain::error::GatewayError;
use handlebars::Handlebars;
use serde::Serialize;

/// Thin wrapper around a strict-mode Handlebars registry.
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        // Missing placeholders are caller bugs; fail loudly instead of
        // silently rendering empty strings into a prompt.
        registry.set_strict_mode(true);
        Self { registry }
    }

    /// Render a template against a serializable context. Render failures are
    /// validation errors: the template reference or its context is malformed.
    pub fn render(&self, template: &str, context: &impl Serialize) -> Result<String, GatewayError> {
        self.registry
            .render_template(template, context)
            .map_err(|e| GatewayError::Validation(format!("template render failed: {e}")))
    }
}
