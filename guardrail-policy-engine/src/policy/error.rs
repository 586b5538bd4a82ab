// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A rule file that a backend could not turn into a module.
///
/// Carries the backend's message plus the 1-based location when the backend
/// knows it (syntax errors usually do, semantic validation errors usually don't).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{message}", location_prefix(.line, .column))]
pub struct ParseError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

fn location_prefix(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!("line {}, column {}: ", line, column),
        (Some(line), None) => format!("line {}: ", line),
        _ => String::new(),
    }
}

/// Errors that abort a policy load. A load never yields a partial snapshot.
#[derive(Debug, Error)]
pub enum PolicyLoadError {
    #[error("failed to walk policy directory {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read policy file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("failed to load policy data from {}: {reason}", .path.display())]
    Data { path: PathBuf, reason: String },
}

impl PolicyLoadError {
    /// The file or directory the failure is attributed to.
    pub fn path(&self) -> &Path {
        match self {
            PolicyLoadError::Walk { root, .. } => root,
            PolicyLoadError::Io { path, .. }
            | PolicyLoadError::Parse { path, .. }
            | PolicyLoadError::Data { path, .. } => path,
        }
    }
}

/// Runtime failure while evaluating rules against one input.
///
/// Distinct from "nothing matched": callers must treat these as a failed
/// evaluation, never as an empty verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("payload field '{field}' is not valid JSON: {reason}")]
    MalformedPayload { field: String, reason: String },

    #[error("cannot iterate over '{path}': expected an array, found {found}")]
    NotIterable { path: String, found: &'static str },

    #[error("message template references undefined value '{path}'")]
    UndefinedReference { path: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("evaluation was interrupted")]
    Interrupted,

    #[error("evaluation exceeded its deadline")]
    DeadlineExceeded,

    #[error("rule backend failure: {0}")]
    Backend(String),
}
