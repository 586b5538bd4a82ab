// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Rego rule backend built on `regorus`.
//!
//! A `.rego` file is one module. Its `package` clause names the package and
//! the partial set rules `deny` and `warn` hold the messages:
//!
//! ```rego
//! package kubernetes.admission.pod
//!
//! import rego.v1
//!
//! deny contains msg if {
//!     some container in input.object.spec.containers
//!     container.securityContext.privileged
//!     msg := sprintf("container '%s' must not run privileged", [container.name])
//! }
//! ```
//!
//! Every module of a package is loaded into one engine per evaluation, so
//! rules spread over several files union naturally. Modules of other
//! packages are not loaded; cross-package `import data.x` is unsupported.

use std::collections::BTreeSet;
use std::path::Path;

use regex::Regex;
use serde_json::Value;

use crate::policy::backend::{EvalContext, ParsedModule, RuleBackend, RuleCollection};
use crate::policy::error::{EvaluationError, ParseError};

const EXTENSION: &str = "rego";

/// Source of one parsed Rego file.
///
/// `regorus` engines are single-threaded, so modules keep the checked source
/// and a fresh engine is assembled on the evaluating thread.
#[derive(Debug, Clone)]
pub struct RegoModule {
    package: String,
    origin: String,
    source: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegoRuleBackend;

impl RuleBackend for RegoRuleBackend {
    type Module = RegoModule;

    fn name(&self) -> &'static str {
        "rego"
    }

    fn recognizes(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(EXTENSION))
            .unwrap_or(false)
    }

    fn parse(&self, source: &Path, text: &str) -> Result<ParsedModule<RegoModule>, ParseError> {
        let origin = source.display().to_string();
        let mut engine = regorus::Engine::new();
        engine
            .add_policy(origin.clone(), text.to_string())
            .map_err(|err| parse_error(&origin, &err.to_string()))?;

        let package = package_clause(text)
            .ok_or_else(|| ParseError::new("module has no package clause"))?;

        Ok(ParsedModule {
            package: package.clone(),
            module: RegoModule {
                package,
                origin,
                source: text.to_string(),
            },
        })
    }

    fn evaluate(
        &self,
        collection: RuleCollection,
        modules: &[&RegoModule],
        ctx: &EvalContext<'_>,
    ) -> Result<BTreeSet<String>, EvaluationError> {
        let Some(first) = modules.first() else {
            return Ok(BTreeSet::new());
        };
        ctx.interrupt.check()?;

        let mut engine = regorus::Engine::new();
        for module in modules {
            engine
                .add_policy(module.origin.clone(), module.source.clone())
                .map_err(backend_error)?;
        }
        engine
            .add_data(to_rego_value(ctx.data)?)
            .map_err(backend_error)?;
        engine.set_input(to_rego_value(&ctx.input.to_document()?)?);
        ctx.interrupt.check()?;

        let query = format!("data.{}.{}", first.package, collection);
        let results = engine
            .eval_query(query.clone(), false)
            .map_err(backend_error)?;
        ctx.interrupt.check()?;

        let mut messages = BTreeSet::new();
        for result in &results.result {
            for expression in &result.expressions {
                if expression.value == regorus::Value::Undefined {
                    continue;
                }
                let json = expression.value.to_json_str().map_err(backend_error)?;
                let value: Value = serde_json::from_str(&json)
                    .map_err(|e| EvaluationError::Backend(e.to_string()))?;
                collect_messages(&query, value, &mut messages)?;
            }
        }
        Ok(messages)
    }
}

fn collect_messages(query: &str, value: Value, out: &mut BTreeSet<String>) -> Result<(), EvaluationError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Null => return Ok(()),
        other => {
            return Err(EvaluationError::Backend(format!(
                "{} must be a set of strings, found {}",
                query, other
            )))
        }
    };
    for item in items {
        match item {
            Value::String(message) => {
                out.insert(message);
            }
            other => {
                return Err(EvaluationError::Backend(format!(
                    "{} produced a non-string message: {}",
                    query, other
                )))
            }
        }
    }
    Ok(())
}

fn to_rego_value(value: &Value) -> Result<regorus::Value, EvaluationError> {
    let json = serde_json::to_string(value).map_err(|e| EvaluationError::InvalidInput(e.to_string()))?;
    regorus::Value::from_json_str(&json).map_err(|e| EvaluationError::InvalidInput(e.to_string()))
}

fn backend_error(err: impl std::fmt::Display) -> EvaluationError {
    EvaluationError::Backend(err.to_string())
}

/// Dotted path from the first `package` clause, ignoring comments.
fn package_clause(text: &str) -> Option<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .find_map(|line| line.strip_prefix("package "))
        .map(|path| path.trim().to_string())
}

/// `regorus` reports syntax errors as `<origin>:<line>:<column>` followed by
/// a snippet; lift the location out when it is there.
fn parse_error(origin: &str, message: &str) -> ParseError {
    let location = Regex::new(&format!(r"{}:(\d+):(\d+)", regex::escape(origin)))
        .ok()
        .and_then(|pattern| pattern.captures(message))
        .and_then(|caps| Some((caps[1].parse().ok()?, caps[2].parse().ok()?)));
    let parsed = ParseError::new(message.trim());
    match location {
        Some((line, column)) => parsed.at(line, column),
        None => parsed,
    }
}
