// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Admission webhook protocol: wire types and the request-to-verdict mapping.

pub mod decision;
pub mod review;

pub use decision::{build_input, decide, route_package, GateFailure};
pub use review::{AdmissionResponse, AdmissionReview, AdmissionReviewResponse};
