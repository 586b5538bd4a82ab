// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Prometheus metrics for the admission gateway.
///
/// Cheap to clone; every clone records into the same registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    /// admission_decisions_total{outcome}
    decisions_total: CounterVec,

    /// admission_rejected_requests_total{reason}: requests refused before evaluation
    rejected_total: CounterVec,

    /// policy_evaluation_duration_seconds
    evaluation_duration: Histogram,

    /// policy_evaluation_errors_total{kind}
    evaluation_errors_total: CounterVec,

    /// policy_reloads_total{result}
    reloads_total: CounterVec,

    policy_modules: Gauge,
    snapshot_generation: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let decisions_total = CounterVec::new(
            Opts::new("admission_decisions_total", "Admission decisions by outcome"),
            &["outcome"],
        )
        .expect("failed to create decisions_total counter");

        let rejected_total = CounterVec::new(
            Opts::new(
                "admission_rejected_requests_total",
                "Admission requests refused before evaluation",
            ),
            &["reason"],
        )
        .expect("failed to create rejected_total counter");

        // 100us to 5s: most evaluations finish well under a millisecond
        let evaluation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "policy_evaluation_duration_seconds",
                "Policy evaluation duration in seconds",
            )
            .buckets(vec![
                0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5,
                1.0, 2.5, 5.0,
            ]),
        )
        .expect("failed to create evaluation_duration histogram");

        let evaluation_errors_total = CounterVec::new(
            Opts::new(
                "policy_evaluation_errors_total",
                "Failed policy evaluations by kind",
            ),
            &["kind"],
        )
        .expect("failed to create evaluation_errors_total counter");

        let reloads_total = CounterVec::new(
            Opts::new("policy_reloads_total", "Policy reload attempts by result"),
            &["result"],
        )
        .expect("failed to create reloads_total counter");

        let policy_modules = Gauge::with_opts(Opts::new(
            "policy_modules_loaded",
            "Rule modules in the published snapshot",
        ))
        .expect("failed to create policy_modules gauge");

        let snapshot_generation = Gauge::with_opts(Opts::new(
            "policy_snapshot_generation",
            "Generation of the published policy snapshot",
        ))
        .expect("failed to create snapshot_generation gauge");

        registry
            .register(Box::new(decisions_total.clone()))
            .expect("failed to register decisions_total");
        registry
            .register(Box::new(rejected_total.clone()))
            .expect("failed to register rejected_total");
        registry
            .register(Box::new(evaluation_duration.clone()))
            .expect("failed to register evaluation_duration");
        registry
            .register(Box::new(evaluation_errors_total.clone()))
            .expect("failed to register evaluation_errors_total");
        registry
            .register(Box::new(reloads_total.clone()))
            .expect("failed to register reloads_total");
        registry
            .register(Box::new(policy_modules.clone()))
            .expect("failed to register policy_modules");
        registry
            .register(Box::new(snapshot_generation.clone()))
            .expect("failed to register snapshot_generation");

        Self {
            registry: Arc::new(registry),
            decisions_total,
            rejected_total,
            evaluation_duration,
            evaluation_errors_total,
            reloads_total,
            policy_modules,
            snapshot_generation,
        }
    }

    pub fn record_decision(&self, outcome: &str) {
        self.decisions_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_rejection(&self, reason: &str) {
        self.rejected_total.with_label_values(&[reason]).inc();
    }

    pub fn observe_evaluation(&self, duration: Duration) {
        self.evaluation_duration.observe(duration.as_secs_f64());
    }

    pub fn record_evaluation_error(&self, kind: &str) {
        self.evaluation_errors_total.with_label_values(&[kind]).inc();
    }

    pub fn record_reload(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.reloads_total.with_label_values(&[result]).inc();
    }

    /// Track the snapshot that is now being served.
    pub fn set_snapshot(&self, modules: usize, generation: u64) {
        self.policy_modules.set(modules as f64);
        self.snapshot_generation.set(generation as f64);
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("failed to encode metrics");
        String::from_utf8(buffer).expect("metrics are not valid UTF-8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
