// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Role Registry
//
// Flat, data-driven mapping from role name to provider identifier and
// prompt template reference. Roles are parameterized calls sharing one
// executor; there is no agent object hierarchy.

use aegis_gateway_core::{ProviderId, SamplingParams};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default synthesis template: merges labeled outputs into one answer.
pub const DEFAULT_SYNTHESIS_TEMPLATE: &str = "\
You are merging the outputs of several specialists into one answer.

{{#each outputs}}\
## {{this.label}}
{{this.content}}

{{/each}}\
Produce a single coherent response that combines the sections above.";

/// Default role template: the payload, framed by the role name.
pub const DEFAULT_ROLE_TEMPLATE: &str = "Role: {{role}}\n\n{{payload}}";

/// Where a role's calls go and how its prompt is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleBinding {
    pub provider: ProviderId,
    /// Handlebars template; sees `role` and `payload` (sub-tasks) or
    /// `outputs` and `failed` (synthesis).
    pub template: String,
    #[serde(default)]
    pub params: SamplingParams,
}

impl RoleBinding {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            template: DEFAULT_ROLE_TEMPLATE.to_string(),
            params: SamplingParams::default(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }
}

/// Lookup table from role name to binding, plus the synthesizer binding.
pub struct RoleRegistry {
    roles: HashMap<String, RoleBinding>,
    synthesizer: RoleBinding,
}

impl RoleRegistry {
    /// An empty registry with synthesis bound to the given provider and the
    /// default synthesis template. Add roles with [`RoleRegistry::insert`].
    pub fn uniform(provider: ProviderId) -> Self {
        Self {
            roles: HashMap::new(),
            synthesizer: RoleBinding::new(provider)
                .with_template(DEFAULT_SYNTHESIS_TEMPLATE),
        }
    }

    pub fn new(synthesizer: RoleBinding) -> Self {
        Self { roles: HashMap::new(), synthesizer }
    }

    pub fn insert(&mut self, role: impl Into<String>, binding: RoleBinding) -> &mut Self {
        self.roles.insert(role.into(), binding);
        self
    }

    /// Resolve a role. Submission validates against this, so an unknown
    /// role is rejected before any sub-task is dispatched.
    pub fn resolve(&self, role: &str) -> Option<&RoleBinding> {
        self.roles.get(role)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    pub fn synthesizer(&self) -> &RoleBinding {
        &self.synthesizer
    }

    pub fn role_names(&self) -> Vec<&str> {
        self.roles.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_roles() {
        let mut registry = RoleRegistry::uniform("default".into());
        registry.insert(
            "critic",
            RoleBinding::new("anthropic".into()).with_template("Critique: {{payload}}"),
        );

        let binding = registry.resolve("critic").unwrap();
        assert_eq!(binding.provider, "anthropic".into());
        assert_eq!(binding.template, "Critique: {{payload}}");
    }

    #[test]
    fn unknown_role_does_not_resolve() {
        let registry = RoleRegistry::uniform("default".into());
        assert!(registry.resolve("never-registered").is_none());
        assert!(!registry.contains("never-registered"));
    }
}
