// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::fs;
use std::path::Path;

use guardrail_policy_engine::policy::{PolicyLoadError, PolicyLoader, SnapshotStore};
use guardrail_policy_engine::yaml::YamlRuleBackend;

use super::{load_shipped, shipped_policies};

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

#[test]
fn test_shipped_policies_load() {
    let (_, snapshot) = load_shipped();
    assert_eq!(snapshot.module_count(), 3);
    assert_eq!(
        snapshot.packages().collect::<Vec<_>>(),
        vec!["gcp.iam.bindings", "kubernetes.admission.pod"]
    );
    assert_eq!(snapshot.modules_in("kubernetes.admission.pod").count(), 2);
}

#[test]
fn test_multiple_roots() {
    let root = shipped_policies();
    let snapshot = PolicyLoader::new(YamlRuleBackend)
        .load(&[root.join("kubernetes"), root.join("gcp")])
        .unwrap();
    assert_eq!(snapshot.package_count(), 2);
}

#[test]
fn test_bad_file_is_named_with_location() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a/good.yaml", "package: a.b\n");
    write(
        dir.path(),
        "b/broken.yaml",
        "package: a.b\ndeny:\n  - message: ok\n    when:\n      - field: x\n        operator: nope\n",
    );

    let err = PolicyLoader::new(YamlRuleBackend)
        .load(&[dir.path()])
        .unwrap_err();

    assert!(err.path().ends_with("b/broken.yaml"));
    match err {
        PolicyLoadError::Parse { source, .. } => assert!(source.message.contains("nope")),
        other => panic!("expected a parse error, got {other}"),
    }
}

#[test]
fn test_semantic_error_aborts_load() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "good.yaml", "package: a.b\n");
    write(
        dir.path(),
        "regex.yaml",
        "package: a.b\ndeny:\n  - when:\n      - field: x\n        operator: matches\n        value: '(['\n    message: m\n",
    );

    let err = PolicyLoader::new(YamlRuleBackend)
        .load(&[dir.path()])
        .unwrap_err();
    assert!(err.to_string().contains("regex.yaml"));
    assert!(err.to_string().contains("invalid regex"));
}

#[test]
fn test_invalid_package_path_aborts_load() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "p.yaml", "package: 'kubernetes..pod'\n");

    let err = PolicyLoader::new(YamlRuleBackend)
        .load(&[dir.path()])
        .unwrap_err();
    assert!(matches!(err, PolicyLoadError::Parse { .. }));
}

#[test]
fn test_non_policy_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "p.yaml", "package: a.b\n");
    write(dir.path(), "policy.rego", "package a.b\n");
    write(dir.path(), "notes.json", "{");

    let snapshot = PolicyLoader::new(YamlRuleBackend).load(&[dir.path()]).unwrap();
    assert_eq!(snapshot.module_count(), 1);
}

#[test]
fn test_reload_publishes_new_generation() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "p.yaml", "package: a.b\n");

    let loader = PolicyLoader::new(YamlRuleBackend);
    let store = SnapshotStore::new(loader.load(&[dir.path()]).unwrap());
    let held = store.current();

    write(dir.path(), "q.yaml", "package: a.c\n");
    let generation = store.publish(loader.load(&[dir.path()]).unwrap());

    assert_eq!(generation, 2);
    assert_eq!(store.current().package_count(), 2);
    assert_eq!(held.package_count(), 1);

    // A broken tree never replaces the published snapshot.
    write(dir.path(), "r.yaml", "package: [");
    assert!(loader.load(&[dir.path()]).is_err());
    assert_eq!(store.generation(), 2);
}
