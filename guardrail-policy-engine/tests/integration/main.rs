// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
mod loading;
mod policy_evaluation;
mod rego_scenarios;
mod scenarios;

use std::path::PathBuf;

use guardrail_policy_engine::policy::{PolicyLoader, Snapshot};
use guardrail_policy_engine::rego::{RegoModule, RegoRuleBackend};
use guardrail_policy_engine::yaml::{YamlModule, YamlRuleBackend};

/// The policy tree shipped at the workspace root
pub fn shipped_policies() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../policies")
}

pub fn load_shipped() -> (PolicyLoader<YamlRuleBackend>, Snapshot<YamlModule>) {
    let loader = PolicyLoader::new(YamlRuleBackend);
    let snapshot = loader.load(&[shipped_policies()]).unwrap();
    (loader, snapshot)
}

/// Same tree through the Rego backend, which only sees the `.rego` files
pub fn load_shipped_rego() -> (PolicyLoader<RegoRuleBackend>, Snapshot<RegoModule>) {
    let loader = PolicyLoader::new(RegoRuleBackend);
    let snapshot = loader.load(&[shipped_policies()]).unwrap();
    (loader, snapshot)
}
