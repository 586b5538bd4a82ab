// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity tag attached to a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single violation or warning produced by a package.
///
/// Ordered by message first, so a set of findings reads alphabetically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Finding {
    pub message: String,
    pub severity: Severity,
    /// Package that produced the finding
    pub policy: String,
}

impl Finding {
    pub fn new(message: impl Into<String>, severity: Severity, policy: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            policy: policy.into(),
        }
    }

    /// A blocking finding from a `deny` rule
    pub fn violation(message: impl Into<String>, policy: impl Into<String>) -> Self {
        Self::new(message, Severity::Error, policy)
    }

    /// An advisory finding from a `warn` rule
    pub fn warning(message: impl Into<String>, policy: impl Into<String>) -> Self {
        Self::new(message, Severity::Warning, policy)
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.severity, self.message, self.policy)
    }
}
