// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::sync::Arc;
use std::thread;

use guardrail_policy_engine::policy::{EvaluationError, EvaluationInput, Interrupt, PolicyLoader};
use guardrail_policy_engine::yaml::YamlRuleBackend;
use serde_json::json;

const BLOCKED_REGISTRIES: &str = r#"
package: kubernetes.admission.pod
deny:
  - each:
      - in: object.spec.containers
        as: container
      - in: data.blocked_registries
        as: registry
    when:
      - field: container.image
        operator: starts_with
        value: placeholder
    message: unused
"#;

const DEPLOYMENT: &str = r#"
package: kubernetes.admission.deployment
deny:
  - each:
      - in: object.spec.template.spec.containers
        as: container
    when:
      - field: container.image
        operator: matches
        value: "^(docker\\.io/)?library/"
    message: "image '{{ container.image }}' must not come from Docker Hub library"
warn:
  - when:
      - field: data.environment
        operator: eq
        value: production
      - field: object.spec.replicas
        operator: lt
        value: 2
    message: "deployment '{{ name }}' runs {{ object.spec.replicas }} replica in {{ data.environment }}"
"#;

#[test]
fn test_data_document_is_visible_to_rules() {
    let loader = PolicyLoader::new(YamlRuleBackend).with_data(json!({"environment": "production"}));
    let snapshot = loader
        .load_sources(&[("deployment.yaml", DEPLOYMENT)])
        .unwrap();

    let input = EvaluationInput::from_document(json!({
        "name": "api",
        "object": {"spec": {"replicas": 1, "template": {"spec": {"containers": [{"image": "gcr.io/p/api:1"}]}}}}
    }))
    .unwrap();

    let result = loader
        .evaluator()
        .evaluate(&snapshot, "kubernetes.admission.deployment", &input)
        .unwrap();
    assert_eq!(result.fail_count(), 0);
    assert_eq!(
        result.warning_messages(),
        vec!["deployment 'api' runs 1 replica in production"]
    );
}

#[test]
fn test_missing_data_key_yields_no_iterations() {
    let loader = PolicyLoader::new(YamlRuleBackend);
    let snapshot = loader.load_sources(&[("r.yaml", BLOCKED_REGISTRIES)]).unwrap();
    let input = EvaluationInput::from_document(json!({
        "object": {"spec": {"containers": [{"image": "placeholder/x"}]}}
    }))
    .unwrap();

    let result = loader
        .evaluator()
        .evaluate(&snapshot, "kubernetes.admission.pod", &input)
        .unwrap();
    assert!(result.is_resolved());
    assert_eq!(result.fail_count(), 0);
}

#[test]
fn test_payload_never_touched_is_never_decoded() {
    let loader = PolicyLoader::new(YamlRuleBackend);
    let snapshot = loader
        .load_sources(&[(
            "ns.yaml",
            "package: kubernetes.admission.namespace\ndeny:\n  - when:\n      - field: operation\n        operator: eq\n        value: DELETE\n    message: namespaces are protected\n",
        )])
        .unwrap();

    let input = EvaluationInput::new()
        .with_field("operation", "DELETE")
        .with_payload_bytes("object", b"not json at all".to_vec());

    let result = loader
        .evaluator()
        .evaluate(&snapshot, "kubernetes.admission.namespace", &input)
        .unwrap();
    assert_eq!(result.violation_messages(), vec!["namespaces are protected"]);
    assert!(!input.is_decoded("object"));
}

#[test]
fn test_expired_deadline_is_an_error() {
    let loader = PolicyLoader::new(YamlRuleBackend);
    let snapshot = loader.load_sources(&[("r.yaml", BLOCKED_REGISTRIES)]).unwrap();
    let input = EvaluationInput::from_document(json!({})).unwrap();

    let err = loader
        .evaluator()
        .evaluate_with(
            &snapshot,
            "kubernetes.admission.pod",
            &input,
            &Interrupt::with_deadline(std::time::Duration::ZERO),
        )
        .unwrap_err();
    assert_eq!(err, EvaluationError::DeadlineExceeded);
}

#[test]
fn test_concurrent_evaluations_share_one_snapshot() {
    let loader = PolicyLoader::new(YamlRuleBackend);
    let snapshot = Arc::new(
        loader
            .load_sources(&[("d.yaml", DEPLOYMENT)])
            .unwrap(),
    );
    let evaluator = loader.evaluator();

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let snapshot = Arc::clone(&snapshot);
            let evaluator = evaluator.clone();
            thread::spawn(move || {
                let image = if i % 2 == 0 { "gcr.io/p/a:1" } else { "docker.io/library/nginx:1" };
                let input = EvaluationInput::from_document(json!({
                    "object": {"spec": {"template": {"spec": {"containers": [{"image": image}]}}}}
                }))
                .unwrap();
                evaluator
                    .evaluate(&snapshot, "kubernetes.admission.deployment", &input)
                    .unwrap()
                    .fail_count()
            })
        })
        .collect();

    let counts: Vec<usize> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert_eq!(counts, vec![0, 1, 0, 1, 0, 1, 0, 1]);
}
