#![no_main]

use arbitrary::Arbitrary;
use guardrail_policy_engine::policy::{EvaluationInput, PolicyLoader};
use guardrail_policy_engine::yaml::YamlRuleBackend;
use libfuzzer_sys::fuzz_target;

const POLICIES: &str = r#"
package: kubernetes.admission.pod
deny:
  - each:
      - in: object.spec.containers
        as: container
    when:
      - field: container.securityContext.privileged
        operator: eq
        value: true
    message: "container '{{ container.name }}' must not run privileged"
  - when:
      - field: object.spec.hostNetwork
        operator: eq
        value: true
    message: "pod '{{ name }}' must not use the host network"
  - each:
      - in: object.spec.containers
        as: container
    when:
      - field: container.image
        operator: matches
        value: ":latest$"
    message: "latest tag on {{ container.image }}"
warn:
  - when:
      - field: oldObject.metadata.labels.owner
        operator: exists
    message: "owner label was {{ oldObject.metadata.labels.owner }}"
"#;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    name: Option<String>,
    operation: String,
    object: Vec<u8>,
    old_object: Option<Vec<u8>>,
}

fuzz_target!(|input: FuzzInput| {
    let loader = PolicyLoader::new(YamlRuleBackend);
    let snapshot = loader
        .load_sources(&[("pod.yaml", POLICIES)])
        .expect("fixture policies are valid");

    let mut evaluation = EvaluationInput::new()
        .with_field("operation", input.operation)
        .with_payload_bytes("object", input.object);
    if let Some(name) = input.name {
        evaluation = evaluation.with_field("name", name);
    }
    if let Some(old) = input.old_object {
        evaluation = evaluation.with_payload_bytes("oldObject", old);
    }

    // Raw bytes of any shape yield a result or an evaluation error, never a panic.
    let evaluator = loader.evaluator();
    let _ = evaluator.evaluate(&snapshot, "kubernetes.admission.pod", &evaluation);
    let _ = evaluator.evaluate_all(&snapshot, &evaluation);
});
