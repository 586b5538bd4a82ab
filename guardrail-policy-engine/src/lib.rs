// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Guardrail Policy Engine - declarative policy evaluation for admission control
//!
//! Loads rule modules from disk into an immutable [`Snapshot`], groups them
//! by package path and evaluates a package's `deny` and `warn` collections
//! against structured input. Rule languages plug in through [`RuleBackend`]:
//! a small YAML language ships as [`yaml::YamlRuleBackend`] and Rego as
//! [`rego::RegoRuleBackend`].
//!
//! # Example
//!
//! ```rust
//! use guardrail_policy_engine::policy::{EvaluationInput, PolicyLoader};
//! use guardrail_policy_engine::yaml::YamlRuleBackend;
//! use serde_json::json;
//!
//! let module = r#"
//! package: payments.transfer
//! deny:
//!   - when:
//!       - field: amount
//!         operator: gt
//!         value: 10000
//!     message: "transfers above 10K require attestation"
//! "#;
//!
//! let loader = PolicyLoader::new(YamlRuleBackend);
//! let snapshot = loader.load_sources(&[("payments.yaml", module)]).unwrap();
//! let evaluator = loader.evaluator();
//!
//! let input = EvaluationInput::from_document(json!({"amount": 50000})).unwrap();
//! let result = evaluator.evaluate(&snapshot, "payments.transfer", &input).unwrap();
//!
//! assert!(result.is_resolved());
//! assert_eq!(result.violation_messages(), vec!["transfers above 10K require attestation"]);
//! ```

pub mod policy;
pub mod rego;
pub mod yaml;

pub use policy::{
    BackendKind, EvaluationError, EvaluationInput, EvaluationResult, Evaluator, Interrupt,
    PolicyLoadError, PolicyLoader, RuleBackend, Snapshot, SnapshotStore,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
