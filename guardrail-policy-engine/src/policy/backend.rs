// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::policy::error::{EvaluationError, ParseError};
use crate::policy::input::EvaluationInput;
use crate::policy::interrupt::Interrupt;

/// The two named, multi-valued rule collections every package may define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCollection {
    /// Blocking findings
    Deny,
    /// Advisory findings
    Warn,
}

impl RuleCollection {
    pub const ALL: [RuleCollection; 2] = [RuleCollection::Deny, RuleCollection::Warn];

    pub fn name(self) -> &'static str {
        match self {
            RuleCollection::Deny => "deny",
            RuleCollection::Warn => "warn",
        }
    }
}

impl fmt::Display for RuleCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rule languages shipped with the engine, as named on the command line
/// and in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Yaml,
    Rego,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Yaml => "yaml",
            BackendKind::Rego => "rego",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yaml" => Ok(BackendKind::Yaml),
            "rego" => Ok(BackendKind::Rego),
            other => Err(format!("unknown rule backend '{}', expected 'yaml' or 'rego'", other)),
        }
    }
}

impl<'de> Deserialize<'de> for BackendKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// What a backend hands back for one rule file.
#[derive(Debug)]
pub struct ParsedModule<M> {
    /// Declared package path, e.g. `kubernetes.admission.pod`
    pub package: String,
    pub module: M,
}

/// Everything a backend may read while evaluating one collection.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub input: &'a EvaluationInput,
    /// Auxiliary data document shared by every evaluation of a snapshot
    pub data: &'a Value,
    pub interrupt: &'a Interrupt,
}

/// A declarative rule language the engine can load and query.
///
/// The loader, evaluator and gateway only ever talk to rules through this
/// trait, so any backend that can answer "which messages does collection X
/// produce for this input" can be swapped in.
pub trait RuleBackend: Send + Sync + 'static {
    /// A compiled rule file. Immutable once parsed.
    type Module: fmt::Debug + Send + Sync + 'static;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Whether `path` is a rule file for this backend. Everything else is ignored by the loader.
    fn recognizes(&self, path: &Path) -> bool;

    /// Parse and validate one rule file.
    fn parse(&self, source: &Path, text: &str) -> Result<ParsedModule<Self::Module>, ParseError>;

    /// Evaluate `collection` across every module of one package.
    ///
    /// Returns the deduplicated union of produced messages. Implementations
    /// must call `ctx.interrupt.check()` often enough to stop promptly.
    fn evaluate(
        &self,
        collection: RuleCollection,
        modules: &[&Self::Module],
        ctx: &EvalContext<'_>,
    ) -> Result<BTreeSet<String>, EvaluationError>;
}
