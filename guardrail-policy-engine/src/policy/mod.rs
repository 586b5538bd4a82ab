// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
pub mod backend;
pub mod engine;
pub mod error;
pub mod input;
pub mod interrupt;
pub mod loader;
pub mod snapshot;
pub mod store;
pub mod violation;

pub use backend::{BackendKind, EvalContext, ParsedModule, RuleBackend, RuleCollection};
pub use engine::{EvaluationResult, Evaluator};
pub use error::{EvaluationError, ParseError, PolicyLoadError};
pub use input::EvaluationInput;
pub use interrupt::{CancelOnDrop, Interrupt};
pub use loader::PolicyLoader;
pub use snapshot::{PolicyModule, Snapshot};
pub use store::SnapshotStore;
pub use violation::{Finding, Severity};
