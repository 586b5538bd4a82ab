// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::sync::Arc;
use std::time::Instant;

use guardrail_policy_engine::policy::{
    EvaluationInput, EvaluationResult, Evaluator, Interrupt, RuleBackend, SnapshotStore,
};

use crate::admission::GateFailure;
use crate::config::Config;
use crate::metrics::Metrics;

/// Shared state behind the admission handler.
pub struct GatewayState<B: RuleBackend> {
    store: Arc<SnapshotStore<B::Module>>,
    evaluator: Evaluator<B>,
    config: Arc<Config>,
    metrics: Metrics,
}

impl<B: RuleBackend> Clone for GatewayState<B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            evaluator: self.evaluator.clone(),
            config: Arc::clone(&self.config),
            metrics: self.metrics.clone(),
        }
    }
}

impl<B: RuleBackend> GatewayState<B> {
    pub fn new(
        store: Arc<SnapshotStore<B::Module>>,
        evaluator: Evaluator<B>,
        config: Arc<Config>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            evaluator,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Evaluate `package` against the currently published snapshot.
    ///
    /// Runs on the blocking pool under the configured request timeout. The
    /// snapshot is pinned for the whole evaluation, so a concurrent reload
    /// never changes the rules halfway through a request. If this future is
    /// dropped or times out the worker is cancelled at its next check.
    pub async fn evaluate(
        &self,
        package: String,
        input: EvaluationInput,
    ) -> Result<EvaluationResult, GateFailure> {
        let timeout = self.config.request_timeout();
        let snapshot = self.store.current();
        let evaluator = self.evaluator.clone();

        let interrupt = Interrupt::with_deadline(timeout);
        let _cancel = interrupt.cancel_on_drop();

        let started = Instant::now();
        let worker = tokio::task::spawn_blocking(move || {
            evaluator.evaluate_with(&snapshot, &package, &input, &interrupt)
        });

        let outcome = match tokio::time::timeout(timeout, worker).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(err))) => Err(GateFailure::Evaluation(err)),
            Ok(Err(join)) => Err(GateFailure::Worker(join.to_string())),
            Err(_) => Err(GateFailure::Timeout(timeout)),
        };

        self.metrics.observe_evaluation(started.elapsed());
        if let Err(failure) = &outcome {
            self.metrics.record_evaluation_error(failure.kind());
        }
        outcome
    }
}
