// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::policy::error::EvaluationError;

/// Undecoded payload bytes, parsed into JSON on first access.
struct RawPayload {
    bytes: Box<[u8]>,
    decoded: OnceLock<Result<Value, String>>,
}

impl RawPayload {
    fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            decoded: OnceLock::new(),
        }
    }

    fn decode(&self) -> &Result<Value, String> {
        self.decoded
            .get_or_init(|| serde_json::from_slice(&self.bytes).map_err(|e| e.to_string()))
    }
}

impl fmt::Debug for RawPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawPayload")
            .field("len", &self.bytes.len())
            .field("decoded", &self.decoded.get().is_some())
            .finish()
    }
}

/// The document rules are evaluated against.
///
/// Named JSON fields plus named raw payloads. Payloads stay as bytes until a
/// rule first reads them, so a request whose rules never look at the object
/// never pays for parsing it, and one schema is never forced on every kind.
#[derive(Debug, Default)]
pub struct EvaluationInput {
    fields: Map<String, Value>,
    payloads: BTreeMap<String, RawPayload>,
}

impl EvaluationInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an input from a JSON object; every top-level key becomes a field.
    pub fn from_document(document: Value) -> Result<Self, EvaluationError> {
        match document {
            Value::Object(fields) => Ok(Self {
                fields,
                payloads: BTreeMap::new(),
            }),
            other => Err(EvaluationError::InvalidInput(format!(
                "expected a JSON object, found {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        self.payloads.remove(&name);
        self.fields.insert(name, value.into());
        self
    }

    pub fn with_payload(mut self, name: impl Into<String>, raw: &RawValue) -> Self {
        self.insert_payload(name.into(), raw.get().as_bytes().to_vec());
        self
    }

    /// Attach payload bytes that are not known to be JSON yet.
    pub fn with_payload_bytes(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert_payload(name.into(), bytes.into());
        self
    }

    fn insert_payload(&mut self, name: String, bytes: Vec<u8>) {
        self.fields.remove(&name);
        self.payloads.insert(name, RawPayload::new(bytes));
    }

    /// Look up a top-level name, decoding its payload if this is the first access.
    pub fn lookup(&self, name: &str) -> Result<Option<&Value>, EvaluationError> {
        if let Some(value) = self.fields.get(name) {
            return Ok(Some(value));
        }
        match self.payloads.get(name) {
            Some(payload) => match payload.decode() {
                Ok(value) => Ok(Some(value)),
                Err(reason) => Err(EvaluationError::MalformedPayload {
                    field: name.to_string(),
                    reason: reason.clone(),
                }),
            },
            None => Ok(None),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.payloads.contains_key(name)
    }

    /// Whether the payload under `name` has been parsed yet.
    pub fn is_decoded(&self, name: &str) -> bool {
        self.payloads
            .get(name)
            .map(|p| p.decoded.get().is_some())
            .unwrap_or(false)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .keys()
            .chain(self.payloads.keys())
            .map(String::as_str)
    }

    /// Materialize the whole input as one JSON object, decoding every payload.
    pub fn to_document(&self) -> Result<Value, EvaluationError> {
        let mut document = self.fields.clone();
        for name in self.payloads.keys() {
            if let Some(value) = self.lookup(name)? {
                document.insert(name.clone(), value.clone());
            }
        }
        Ok(Value::Object(document))
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
