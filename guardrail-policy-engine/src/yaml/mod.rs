// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Bundled YAML rule backend.
//!
//! One file is one module:
//!
//! ```yaml
//! package: kubernetes.admission.pod
//! deny:
//!   - name: privileged-container
//!     each:
//!       - in: object.spec.containers
//!         as: container
//!     when:
//!       - field: container.securityContext.privileged
//!         operator: eq
//!         value: true
//!     message: "container '{{ container.name }}' must not run privileged"
//! warn: []
//! ```
//!
//! A rule fires once per combination of generator bindings for which every
//! `when` condition holds, producing its rendered message.

pub mod definition;
pub mod rule;
pub mod scope;
pub mod template;

use std::collections::BTreeSet;
use std::path::Path;

use crate::policy::backend::{EvalContext, ParsedModule, RuleBackend, RuleCollection};
use crate::policy::error::{EvaluationError, ParseError};

pub use definition::ModuleDefinition;
pub use rule::{CompiledRule, Operator, YamlModule};

const EXTENSIONS: [&str; 2] = ["yaml", "yml"];

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlRuleBackend;

impl RuleBackend for YamlRuleBackend {
    type Module = YamlModule;

    fn name(&self) -> &'static str {
        "yaml"
    }

    fn recognizes(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
            .unwrap_or(false)
    }

    fn parse(&self, _source: &Path, text: &str) -> Result<ParsedModule<YamlModule>, ParseError> {
        let definition = ModuleDefinition::from_yaml(text)?;
        let module = YamlModule::compile(definition)?;
        Ok(ParsedModule {
            package: module.package().to_string(),
            module,
        })
    }

    fn evaluate(
        &self,
        collection: RuleCollection,
        modules: &[&YamlModule],
        ctx: &EvalContext<'_>,
    ) -> Result<BTreeSet<String>, EvaluationError> {
        let mut messages = BTreeSet::new();
        for module in modules {
            for rule in module.rules(collection) {
                ctx.interrupt.check()?;
                let mut scope = scope::Scope::new(ctx);
                rule.evaluate(&mut scope, ctx.interrupt, &mut messages)?;
            }
        }
        Ok(messages)
    }
}

impl From<serde_yaml::Error> for ParseError {
    fn from(err: serde_yaml::Error) -> Self {
        let location = err.location();
        let parsed = ParseError::new(err.to_string());
        match location {
            Some(location) => parsed.at(location.line(), location.column()),
            None => parsed,
        }
    }
}
