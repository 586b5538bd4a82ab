// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Test fixtures shared by the gateway's unit tests.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use guardrail_policy_engine::policy::{
    EvalContext, EvaluationError, ParseError, ParsedModule, PolicyLoader, RuleBackend,
    RuleCollection, SnapshotStore,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::config::Config;
use crate::metrics::Metrics;
use crate::state::GatewayState;

pub fn config_with(vars: &[(&str, &str)]) -> Config {
    Config::from_vars(
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    )
    .unwrap()
}

pub fn state_with<B: RuleBackend>(
    backend: B,
    sources: &[(&str, &str)],
    config: Config,
) -> GatewayState<B> {
    let loader = PolicyLoader::new(backend);
    let snapshot = loader.load_sources(sources).unwrap();
    GatewayState::new(
        Arc::new(SnapshotStore::new(snapshot)),
        loader.evaluator(),
        Arc::new(config),
        Metrics::new(),
    )
}

/// Reads `package: <path>` from the first line; modules carry no rules.
fn package_line(text: &str) -> Result<ParsedModule<()>, ParseError> {
    let package = text
        .trim()
        .strip_prefix("package:")
        .map(str::trim)
        .ok_or_else(|| ParseError::new("missing package"))?;
    Ok(ParsedModule {
        package: package.to_string(),
        module: (),
    })
}

/// Spins until interrupted.
#[derive(Debug)]
pub struct SlowBackend;

impl RuleBackend for SlowBackend {
    type Module = ();

    fn name(&self) -> &'static str {
        "slow"
    }

    fn recognizes(&self, _path: &Path) -> bool {
        true
    }

    fn parse(&self, _source: &Path, text: &str) -> Result<ParsedModule<()>, ParseError> {
        package_line(text)
    }

    fn evaluate(
        &self,
        _collection: RuleCollection,
        _modules: &[&()],
        ctx: &EvalContext<'_>,
    ) -> Result<BTreeSet<String>, EvaluationError> {
        loop {
            ctx.interrupt.check()?;
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

/// Fails every evaluation.
#[derive(Debug)]
pub struct FailingBackend;

impl RuleBackend for FailingBackend {
    type Module = ();

    fn name(&self) -> &'static str {
        "failing"
    }

    fn recognizes(&self, _path: &Path) -> bool {
        true
    }

    fn parse(&self, _source: &Path, text: &str) -> Result<ParsedModule<()>, ParseError> {
        package_line(text)
    }

    fn evaluate(
        &self,
        _collection: RuleCollection,
        _modules: &[&()],
        _ctx: &EvalContext<'_>,
    ) -> Result<BTreeSet<String>, EvaluationError> {
        Err(EvaluationError::Backend("rule store unavailable".to_string()))
    }
}

/// A v1 AdmissionReview for a CREATE of `kind`.
pub fn review(uid: &str, kind: &str, object: Value) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": uid,
            "kind": {"group": "", "version": "v1", "kind": kind},
            "resource": {"group": "", "version": "v1", "resource": format!("{}s", kind.to_lowercase())},
            "name": object["metadata"]["name"].as_str().unwrap_or("unnamed"),
            "namespace": "default",
            "operation": "CREATE",
            "userInfo": {"username": "kubernetes-admin"},
            "object": object,
            "oldObject": null,
            "dryRun": false
        }
    })
}

pub fn post_json(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/validate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Send one request and decode the JSON body, `Value::Null` if it has none.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
