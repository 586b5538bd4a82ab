// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Policy tree loader.
//!
//! Walks one or more root directories, hands every file the backend
//! recognizes to [`RuleBackend::parse`] and groups the results into a
//! [`Snapshot`]. Any failure aborts the whole load: a snapshot is either
//! complete or not produced at all.
//!
//! Symbolic links are followed. A file reachable through several paths is
//! loaded once, from the first path the walk reaches it by. Dangling links
//! and link cycles abort the load.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::policy::backend::RuleBackend;
use crate::policy::engine::Evaluator;
use crate::policy::error::{ParseError, PolicyLoadError};
use crate::policy::snapshot::{PolicyModule, Snapshot};

pub struct PolicyLoader<B: RuleBackend> {
    backend: Arc<B>,
    data: Value,
}

impl<B: RuleBackend> PolicyLoader<B> {
    pub fn new(backend: B) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    pub fn from_shared(backend: Arc<B>) -> Self {
        Self {
            backend,
            data: Value::Object(Default::default()),
        }
    }

    /// Attach the auxiliary data document exposed to rules under `data`.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Read the auxiliary data document from a JSON file.
    pub fn with_data_file(self, path: &Path) -> Result<Self, PolicyLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| PolicyLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let data: Value = serde_json::from_str(&text).map_err(|e| PolicyLoadError::Data {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !data.is_object() {
            return Err(PolicyLoadError::Data {
                path: path.to_path_buf(),
                reason: "top-level value must be a JSON object".to_string(),
            });
        }
        Ok(self.with_data(data))
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// An evaluator sharing this loader's backend.
    pub fn evaluator(&self) -> Evaluator<B> {
        Evaluator::from_shared(Arc::clone(&self.backend))
    }

    /// Load every recognized rule file under `roots`.
    pub fn load<P: AsRef<Path>>(&self, roots: &[P]) -> Result<Snapshot<B::Module>, PolicyLoadError> {
        let mut modules = Vec::new();
        let mut seen = HashSet::new();

        for root in roots {
            let root = root.as_ref();
            for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
                let entry = entry.map_err(|source| PolicyLoadError::Walk {
                    root: root.to_path_buf(),
                    source,
                })?;
                if !entry.file_type().is_file() || !self.backend.recognizes(entry.path()) {
                    continue;
                }
                let canonical = entry.path().canonicalize().map_err(|source| PolicyLoadError::Io {
                    path: entry.path().to_path_buf(),
                    source,
                })?;
                if !seen.insert(canonical) {
                    debug!(path = %entry.path().display(), "skipping already loaded policy file");
                    continue;
                }
                modules.push(self.load_file(entry.path())?);
            }
        }

        Ok(self.finish(modules))
    }

    /// Read and parse one rule file.
    pub fn load_file(&self, path: &Path) -> Result<PolicyModule<B::Module>, PolicyLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| PolicyLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_source(path, &text)
    }

    /// Parse rule text that did not come from disk.
    pub fn parse_source(&self, path: &Path, text: &str) -> Result<PolicyModule<B::Module>, PolicyLoadError> {
        let parsed = self
            .backend
            .parse(path, text)
            .and_then(|parsed| validate_package_path(&parsed.package).map(|_| parsed))
            .map_err(|source| PolicyLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(
            backend = self.backend.name(),
            path = %path.display(),
            package = %parsed.package,
            "parsed policy module"
        );
        Ok(PolicyModule::new(path, parsed.package, parsed.module))
    }

    /// Build a snapshot from in-memory `(name, text)` pairs, in order.
    pub fn load_sources(&self, sources: &[(&str, &str)]) -> Result<Snapshot<B::Module>, PolicyLoadError> {
        let modules = sources
            .iter()
            .map(|(name, text)| self.parse_source(&PathBuf::from(name), text))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.finish(modules))
    }

    fn finish(&self, modules: Vec<PolicyModule<B::Module>>) -> Snapshot<B::Module> {
        let snapshot = Snapshot::new(modules, self.data.clone());
        info!(
            backend = self.backend.name(),
            modules = snapshot.module_count(),
            packages = snapshot.package_count(),
            "policy snapshot loaded"
        );
        snapshot
    }
}

/// Package paths are opaque dotted names; only their shape is checked.
pub fn validate_package_path(package: &str) -> Result<(), ParseError> {
    if package.is_empty() {
        return Err(ParseError::new("package must not be empty"));
    }
    for segment in package.split('.') {
        if segment.is_empty() {
            return Err(ParseError::new(format!(
                "package '{}' contains an empty segment",
                package
            )));
        }
        if segment.chars().any(char::is_whitespace) {
            return Err(ParseError::new(format!(
                "package '{}' contains whitespace",
                package
            )));
        }
    }
    Ok(())
}
