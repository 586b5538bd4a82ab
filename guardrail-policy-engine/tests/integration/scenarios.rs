// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use guardrail_policy_engine::policy::EvaluationInput;
use serde_json::value::RawValue;
use serde_json::{json, Value};

use super::load_shipped;

pub const POD_PACKAGE: &str = "kubernetes.admission.pod";

pub fn pod_input(name: &str, pod: Value) -> EvaluationInput {
    let raw = RawValue::from_string(pod.to_string()).unwrap();
    EvaluationInput::new()
        .with_field("kind", "Pod")
        .with_field("name", name)
        .with_field("namespace", "default")
        .with_field("operation", "CREATE")
        .with_payload("object", &raw)
}

pub fn compliant_pod() -> Value {
    json!({
        "metadata": {"labels": {"app": "web", "owner": "team-a"}},
        "spec": {
            "securityContext": {"runAsNonRoot": true},
            "containers": [{
                "name": "app",
                "image": "nginx:1.25",
                "resources": {"limits": {"cpu": "500m", "memory": "128Mi"}}
            }]
        }
    })
}

#[test]
fn test_privileged_container_is_denied() {
    let (loader, snapshot) = load_shipped();
    let mut pod = compliant_pod();
    pod["spec"]["containers"][0]["securityContext"] = json!({"privileged": true});

    let result = loader
        .evaluator()
        .evaluate(&snapshot, POD_PACKAGE, &pod_input("web", pod))
        .unwrap();

    assert!(result.is_resolved());
    assert_eq!(
        result.violation_messages(),
        vec!["container 'app' must not run privileged"]
    );
}

#[test]
fn test_compliant_pod_has_no_findings() {
    let (loader, snapshot) = load_shipped();
    let result = loader
        .evaluator()
        .evaluate(&snapshot, POD_PACKAGE, &pod_input("web", compliant_pod()))
        .unwrap();

    assert!(result.is_resolved());
    assert_eq!(result.fail_count(), 0);
    assert_eq!(result.warn_count(), 0);
}

#[test]
fn test_findings_union_across_pod_modules() {
    let (loader, snapshot) = load_shipped();
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
    assert_eq!(
        result.warning_messages(),
        vec![
            "pod 'web' should carry an 'owner' label",
            "pod 'web' should set securityContext.runAsNonRoot",
        ]
    );
}

#[test]
fn test_warn_only_pod() {
    let (loader, snapshot) = load_shipped();
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
fn test_owner_role_granted_to_user_is_denied() {
    let (loader, snapshot) = load_shipped();
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
}

#[test]
fn test_public_principal_and_basic_role() {
    let (loader, snapshot) = load_shipped();
    let input = EvaluationInput::from_document(json!({
        "bindings": [
            {"role": "roles/editor", "members": ["allUsers", "serviceAccount:ci@p.iam.gserviceaccount.com"]}
        ]
    }))
    .unwrap();

    let result = loader
        .evaluator()
        .evaluate(&snapshot, "gcp.iam.bindings", &input)
        .unwrap();

    assert_eq!(
        result.violation_messages(),
        vec!["roles/editor must not be granted to public principal 'allUsers'"]
    );
    assert_eq!(
        result.warning_messages(),
        vec!["prefer predefined roles over the basic roles/editor role"]
    );
}
