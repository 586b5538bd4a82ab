// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::fmt;

use serde_json::Value;

use crate::policy::backend::EvalContext;
use crate::policy::error::{EvaluationError, ParseError};
use crate::policy::input::EvaluationInput;

/// Root name under which the auxiliary data document is exposed
pub const DATA_ROOT: &str = "data";
/// Optional prefix naming the input document explicitly
pub const INPUT_ROOT: &str = "input";

/// A dot-separated path such as `object.spec.containers.0.image`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let trimmed = raw.trim();
        let mut segments: Vec<String> = trimmed.split('.').map(str::to_string).collect();
        if segments.len() > 1 && segments[0] == INPUT_ROOT {
            segments.remove(0);
        }
        if trimmed.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(ParseError::new(format!("invalid field path '{}'", raw)));
        }
        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    pub fn rest(&self) -> &[String] {
        &self.segments[1..]
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Follow `segments` down from `value`; numeric segments index arrays.
pub fn descend<'v>(value: &'v Value, segments: &[String]) -> Option<&'v Value> {
    segments.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Name resolution for one rule evaluation: generator bindings, then
/// `data`, then input fields.
pub struct Scope<'s> {
    input: &'s EvaluationInput,
    data: &'s Value,
    bindings: Vec<(&'s str, &'s Value)>,
}

impl<'s> Scope<'s> {
    pub fn new(ctx: &EvalContext<'s>) -> Self {
        Self {
            input: ctx.input,
            data: ctx.data,
            bindings: Vec::new(),
        }
    }

    pub fn push(&mut self, name: &'s str, value: &'s Value) {
        self.bindings.push((name, value));
    }

    pub fn pop(&mut self) {
        self.bindings.pop();
    }

    /// `Ok(None)` means undefined. Errors only come from decoding a raw payload.
    pub fn resolve(&self, path: &FieldPath) -> Result<Option<&'s Value>, EvaluationError> {
        let root = path.root();
        let base = if let Some((_, value)) = self.bindings.iter().rev().find(|(name, _)| *name == root) {
            Some(*value)
        } else if root == DATA_ROOT {
            Some(self.data)
        } else {
            self.input.lookup(root)?
        };
        Ok(base.and_then(|value| descend(value, path.rest())))
    }
}
