// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
mod health;
mod metrics;
mod validate;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use guardrail_policy_engine::policy::RuleBackend;
use tower_http::trace::TraceLayer;

use crate::state::GatewayState;

pub use health::health;
pub use metrics::metrics_handler;
pub use validate::validate;

/// Application router: the webhook plus probe and metrics endpoints.
pub fn router<B: RuleBackend>(state: GatewayState<B>) -> Router {
    let metrics = state.metrics().clone();
    let body_limit = state.config().max_body_bytes;

    Router::new()
        .route("/validate", post(validate::<B>))
        .with_state(state)
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler).with_state(metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}
