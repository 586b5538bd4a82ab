// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// One parsed rule file
#[derive(Debug)]
pub struct PolicyModule<M> {
    source: PathBuf,
    package: String,
    compiled: M,
}

impl<M> PolicyModule<M> {
    pub fn new(source: impl Into<PathBuf>, package: impl Into<String>, compiled: M) -> Self {
        Self {
            source: source.into(),
            package: package.into(),
            compiled,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn compiled(&self) -> &M {
        &self.compiled
    }
}

/// Immutable set of loaded modules grouped by package.
///
/// Built once per load and shared behind an `Arc`. Nothing here hands out
/// mutable access, so concurrent evaluations read it without locking.
#[derive(Debug)]
pub struct Snapshot<M> {
    modules: Vec<PolicyModule<M>>,
    /// package path -> indices into `modules`, in load order
    index: BTreeMap<String, Vec<usize>>,
    data: Value,
}

impl<M> Snapshot<M> {
    pub fn new(modules: Vec<PolicyModule<M>>, data: Value) -> Self {
        let mut index: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (position, module) in modules.iter().enumerate() {
            index
                .entry(module.package.clone())
                .or_default()
                .push(position);
        }

        Self {
            modules,
            index,
            data,
        }
    }

    /// A snapshot with no modules; every package is unresolved.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Value::Object(Default::default()))
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn package_count(&self) -> usize {
        self.index.len()
    }

    /// Distinct package paths, sorted.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn contains_package(&self, package: &str) -> bool {
        self.index.contains_key(package)
    }

    /// Modules contributing to `package`, in load order.
    pub fn modules_in<'a>(&'a self, package: &str) -> impl Iterator<Item = &'a PolicyModule<M>> + 'a {
        self.index
            .get(package)
            .into_iter()
            .flatten()
            .map(move |&position| &self.modules[position])
    }

    /// Compiled modules for `package`; empty when the package is unknown.
    pub fn compiled_for(&self, package: &str) -> Vec<&M> {
        self.modules_in(package).map(PolicyModule::compiled).collect()
    }

    pub fn modules(&self) -> &[PolicyModule<M>] {
        &self.modules
    }

    /// Auxiliary data document exposed to rules
    pub fn data(&self) -> &Value {
        &self.data
    }
}
