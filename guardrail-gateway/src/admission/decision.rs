// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::time::Duration;

use guardrail_policy_engine::policy::{EvaluationError, EvaluationInput, EvaluationResult};
use serde_json::Value;
use thiserror::Error;

use crate::admission::review::{AdmissionRequest, AdmissionResponse};
use crate::config::UnresolvedPolicy;

/// Separator between violation messages in a denial
pub const MESSAGE_DELIMITER: &str = "; ";

/// Package evaluated for a request kind: `<prefix>.<lower-cased kind>`.
pub fn route_package(prefix: &str, kind: &str) -> String {
    format!("{}.{}", prefix.trim_end_matches('.'), kind.to_ascii_lowercase())
}

/// Map an admission request onto the evaluation input document.
///
/// `object`, `oldObject` and `options` are attached as raw payloads and only
/// parsed if a rule reads them.
pub fn build_input(request: &AdmissionRequest) -> EvaluationInput {
    let mut input = EvaluationInput::new()
        .with_field("kind", request.kind.kind.clone())
        .with_field("name", request.name.clone().unwrap_or_default())
        .with_field("namespace", request.namespace.clone().unwrap_or_default())
        .with_field("operation", request.operation.as_str());

    input = match &request.object {
        Some(object) => input.with_payload("object", object),
        None => input.with_field("object", Value::Null),
    };
    if let Some(old_object) = &request.old_object {
        input = input.with_payload("oldObject", old_object);
    }
    if let Some(options) = &request.options {
        input = input.with_payload("options", options);
    }
    input
}

/// Reasons the gate could not obtain a verdict. Every one of them denies.
#[derive(Debug, Error)]
pub enum GateFailure {
    #[error("policy evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("policy evaluation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("policy evaluation worker failed: {0}")]
    Worker(String),
}

impl GateFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            GateFailure::Evaluation(EvaluationError::DeadlineExceeded) => "deadline",
            GateFailure::Evaluation(EvaluationError::Interrupted) => "interrupted",
            GateFailure::Evaluation(_) => "evaluation",
            GateFailure::Timeout(_) => "timeout",
            GateFailure::Worker(_) => "worker",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Allowed,
    Denied,
    UnresolvedAllowed,
    UnresolvedDenied,
    Failed,
}

impl Outcome {
    /// Label used for metrics and logs
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Allowed => "allowed",
            Outcome::Denied => "denied",
            Outcome::UnresolvedAllowed => "unresolved_allowed",
            Outcome::UnresolvedDenied => "unresolved_denied",
            Outcome::Failed => "error",
        }
    }
}

#[derive(Debug)]
pub struct Verdict {
    pub response: AdmissionResponse,
    pub outcome: Outcome,
}

/// Turn an evaluation outcome into the admission response for `uid`.
pub fn decide(
    uid: &str,
    package: &str,
    evaluation: Result<EvaluationResult, GateFailure>,
    unresolved: UnresolvedPolicy,
) -> Verdict {
    let result = match evaluation {
        Ok(result) => result,
        Err(failure) => {
            return Verdict {
                response: AdmissionResponse::deny(uid, failure.to_string()),
                outcome: Outcome::Failed,
            }
        }
    };

    if !result.is_resolved() {
        return match unresolved {
            UnresolvedPolicy::Allow => Verdict {
                response: AdmissionResponse::allow(uid),
                outcome: Outcome::UnresolvedAllowed,
            },
            UnresolvedPolicy::Deny => Verdict {
                response: AdmissionResponse::deny(
                    uid,
                    format!("no policy package '{}' is loaded for this kind", package),
                ),
                outcome: Outcome::UnresolvedDenied,
            },
        };
    }

    let warnings: Vec<String> = result
        .warning_messages()
        .into_iter()
        .map(str::to_string)
        .collect();

    if result.has_violations() {
        let message = result.violation_messages().join(MESSAGE_DELIMITER);
        Verdict {
            response: AdmissionResponse::deny(uid, message).with_warnings(warnings),
            outcome: Outcome::Denied,
        }
    } else {
        Verdict {
            response: AdmissionResponse::allow(uid).with_warnings(warnings),
            outcome: Outcome::Allowed,
        }
    }
}
