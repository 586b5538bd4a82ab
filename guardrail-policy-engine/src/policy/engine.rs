// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::policy::backend::{EvalContext, RuleBackend, RuleCollection};
use crate::policy::error::EvaluationError;
use crate::policy::input::EvaluationInput;
use crate::policy::interrupt::Interrupt;
use crate::policy::snapshot::Snapshot;
use crate::policy::violation::Finding;

/// Verdict of one package against one input.
///
/// Built fresh per call and read-only afterwards. The evaluator reports what
/// the rules found; deciding allow or deny is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationResult {
    package: String,
    resolved: bool,
    violations: BTreeSet<Finding>,
    warnings: BTreeSet<Finding>,
    fail_count: usize,
    warn_count: usize,
}

impl EvaluationResult {
    /// Result for a package with no modules.
    pub fn unresolved(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            resolved: false,
            violations: BTreeSet::new(),
            warnings: BTreeSet::new(),
            fail_count: 0,
            warn_count: 0,
        }
    }

    fn resolved(package: &str, deny: BTreeSet<String>, warn: BTreeSet<String>) -> Self {
        let violations: BTreeSet<Finding> = deny
            .into_iter()
            .map(|message| Finding::violation(message, package))
            .collect();
        let warnings: BTreeSet<Finding> = warn
            .into_iter()
            .map(|message| Finding::warning(message, package))
            .collect();

        Self {
            package: package.to_string(),
            resolved: true,
            fail_count: violations.len(),
            warn_count: warnings.len(),
            violations,
            warnings,
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// False when no module declares the package.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn violations(&self) -> &BTreeSet<Finding> {
        &self.violations
    }

    pub fn warnings(&self) -> &BTreeSet<Finding> {
        &self.warnings
    }

    pub fn fail_count(&self) -> usize {
        self.fail_count
    }

    pub fn warn_count(&self) -> usize {
        self.warn_count
    }

    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Violation messages in lexical order
    pub fn violation_messages(&self) -> Vec<&str> {
        self.violations.iter().map(|f| f.message.as_str()).collect()
    }

    /// Warning messages in lexical order
    pub fn warning_messages(&self) -> Vec<&str> {
        self.warnings.iter().map(|f| f.message.as_str()).collect()
    }
}

/// Runs a package's `deny` and `warn` collections against an input.
pub struct Evaluator<B: RuleBackend> {
    backend: Arc<B>,
}

impl<B: RuleBackend> Clone for Evaluator<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: RuleBackend> Evaluator<B> {
    pub fn new(backend: B) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    pub fn from_shared(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Evaluate `package` with no deadline.
    pub fn evaluate(
        &self,
        snapshot: &Snapshot<B::Module>,
        package: &str,
        input: &EvaluationInput,
    ) -> Result<EvaluationResult, EvaluationError> {
        self.evaluate_with(snapshot, package, input, &Interrupt::none())
    }

    /// Evaluate `package`, stopping early once `interrupt` fires.
    pub fn evaluate_with(
        &self,
        snapshot: &Snapshot<B::Module>,
        package: &str,
        input: &EvaluationInput,
        interrupt: &Interrupt,
    ) -> Result<EvaluationResult, EvaluationError> {
        interrupt.check()?;

        let modules = snapshot.compiled_for(package);
        if modules.is_empty() {
            trace!(package, "no modules for package");
            return Ok(EvaluationResult::unresolved(package));
        }

        let ctx = EvalContext {
            input,
            data: snapshot.data(),
            interrupt,
        };
        let deny = self.backend.evaluate(RuleCollection::Deny, &modules, &ctx)?;
        let warn = self.backend.evaluate(RuleCollection::Warn, &modules, &ctx)?;

        let result = EvaluationResult::resolved(package, deny, warn);
        trace!(
            package,
            fail_count = result.fail_count(),
            warn_count = result.warn_count(),
            "package evaluated"
        );
        Ok(result)
    }

    /// Evaluate every loaded package, ordered by package path.
    ///
    /// A failing package is reported in place; the rest still run.
    pub fn evaluate_all(
        &self,
        snapshot: &Snapshot<B::Module>,
        input: &EvaluationInput,
    ) -> Vec<(String, Result<EvaluationResult, EvaluationError>)> {
        snapshot
            .packages()
            .map(|package| (package.to_string(), self.evaluate(snapshot, package, input)))
            .collect()
    }
}
