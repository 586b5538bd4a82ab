// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::fs;

use guardrail_policy_engine::policy::{EvaluationInput, PolicyLoadError, PolicyLoader};
use guardrail_policy_engine::rego::RegoRuleBackend;
use serde_json::json;

use super::load_shipped_rego;
use super::scenarios::{compliant_pod, pod_input, POD_PACKAGE};

#[test]
fn test_shipped_rego_policies_load() {
    let (_, snapshot) = load_shipped_rego();
    assert_eq!(snapshot.module_count(), 3);
    assert_eq!(
        snapshot.packages().collect::<Vec<_>>(),
        vec!["gcp.iam.bindings", "kubernetes.admission.pod"]
    );
    assert!(snapshot
        .modules()
        .iter()
        .all(|m| m.source().extension().unwrap() == "rego"));
}

#[test]
fn test_rego_privileged_container_is_denied() {
    let (loader, snapshot) = load_shipped_rego();
    let mut pod = compliant_pod();
    pod["spec"]["containers"][0]["securityContext"] = json!({"privileged": true});

    let result = loader
        .evaluator()
        .evaluate(&snapshot, POD_PACKAGE, &pod_input("web", pod))
        .unwrap();

    assert!(result.is_resolved());
    assert!(result.has_violations());
    assert_eq!(
        result.violation_messages(),
        vec!["container 'app' must not run privileged"]
    );
}

#[test]
fn test_rego_compliant_pod_has_no_findings() {
    let (loader, snapshot) = load_shipped_rego();
    let result = loader
        .evaluator()
        .evaluate(&snapshot, POD_PACKAGE, &pod_input("web", compliant_pod()))
        .unwrap();

    assert_eq!(result.fail_count(), 0);
    assert_eq!(result.warn_count(), 0);
}

#[test]
fn test_rego_owner_role_granted_to_user_is_denied() {
    let (loader, snapshot) = load_shipped_rego();
    let input = EvaluationInput::from_document(json!({
        "bindings": [
            {"role": "roles/owner", "members": ["user:alice@example.com", "group:admins@example.com"]},
            {"role": "roles/viewer", "members": ["user:bob@example.com"]}
        ]
    }))
    .unwrap();

    let result = loader
        .evaluator()
        .evaluate(&snapshot, "gcp.iam.bindings", &input)
        .unwrap();

    assert_eq!(
        result.violation_messages(),
        vec!["roles/owner must not be granted to individual user 'user:alice@example.com'"]
    );
    assert!(result.warning_messages().is_empty());
}

#[test]
fn test_rego_warn_only_pod_is_allowed() {
    let (loader, snapshot) = load_shipped_rego();
    let mut pod = compliant_pod();
    pod["metadata"]["labels"] = json!({"app": "web"});

    let result = loader
        .evaluator()
        .evaluate(&snapshot, POD_PACKAGE, &pod_input("web", pod))
        .unwrap();

    assert!(!result.has_violations());
    assert_eq!(result.warning_messages(), vec!["pod 'web' should carry an 'owner' label"]);
}

#[test]
fn test_rego_findings_union_across_modules() {
    let (loader, snapshot) = load_shipped_rego();
    let pod = json!({
        "spec": {
            "hostNetwork": true,
            "containers": [{"name": "app", "image": "nginx:latest"}]
        }
    });

    let result = loader
        .evaluator()
        .evaluate(&snapshot, POD_PACKAGE, &pod_input("web", pod))
        .unwrap();

    assert_eq!(
        result.violation_messages(),
        vec![
            "container 'app' must declare resource limits",
            "container 'app' must not use the latest image tag",
            "pod 'web' must carry an 'app' label",
            "pod 'web' must not use the host network",
        ]
    );
    assert_eq!(result.warn_count(), 2);
}

#[test]
fn test_rego_syntax_error_is_named_with_location() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("broken.rego"),
        "package kubernetes.admission.pod\n\nimport rego.v1\n\ndeny contains msg if {\n    msg := \"x\"\n",
    )
    .unwrap();

    let err = PolicyLoader::new(RegoRuleBackend)
        .load(&[dir.path()])
        .unwrap_err();

    assert!(err.path().ends_with("broken.rego"));
    match err {
        PolicyLoadError::Parse { source, .. } => {
            assert!(source.line.is_some());
            assert!(source.column.is_some());
        }
        other => panic!("expected a parse error, got {other}"),
    }
}
