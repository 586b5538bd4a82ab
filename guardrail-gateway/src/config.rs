// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use guardrail_policy_engine::policy::BackendKind;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Verdict for requests whose kind maps to no loaded package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedPolicy {
    Allow,
    Deny,
}

impl UnresolvedPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            UnresolvedPolicy::Allow => "allow",
            UnresolvedPolicy::Deny => "deny",
        }
    }
}

impl fmt::Display for UnresolvedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UnresolvedPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(UnresolvedPolicy::Allow),
            "deny" => Ok(UnresolvedPolicy::Deny),
            other => Err(serde::de::Error::custom(format!(
                "UNRESOLVED_POLICY must be 'allow' or 'deny', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment configuration: {0}")]
    Env(#[from] envy::Error),

    #[error("TLS_CERT_FILE and TLS_KEY_FILE must be set together")]
    TlsIncomplete,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration loaded from environment variables.
///
/// Built once at startup and passed by value or `Arc` to whatever needs it.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (default: 8443)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Policy directories, separated by commas or the platform path-list
    /// separator (default: policies/kubernetes)
    #[serde(default = "default_policy_dirs")]
    pub policy_dirs: String,

    /// Rule language of the policy files: yaml or rego (default: yaml)
    #[serde(default)]
    pub policy_backend: BackendKind,

    /// Optional JSON document exposed to rules under `data`
    #[serde(default)]
    pub policy_data_file: Option<PathBuf>,

    /// Prefix joined with the lower-cased kind to pick a package
    #[serde(default = "default_package_prefix")]
    pub package_prefix: String,

    /// Verdict when no package matches the request kind (default: allow)
    #[serde(default = "default_unresolved_policy")]
    pub unresolved_policy: UnresolvedPolicy,

    /// Evaluation deadline per request in milliseconds (default: 3000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum accepted request body in bytes (default: 3 MiB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Periodic reload interval in seconds, 0 disables (default: 0)
    #[serde(default)]
    pub policy_reload_interval_secs: u64,

    #[serde(default)]
    pub tls_cert_file: Option<PathBuf>,

    #[serde(default)]
    pub tls_key_file: Option<PathBuf>,

    /// Log level (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "json" or "pretty" (default: json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8443
}

fn default_policy_dirs() -> String {
    "policies/kubernetes".to_string()
}

fn default_package_prefix() -> String {
    "kubernetes.admission".to_string()
}

fn default_unresolved_policy() -> UnresolvedPolicy {
    UnresolvedPolicy::Allow
}

fn default_request_timeout_ms() -> u64 {
    3000
}

fn default_max_body_bytes() -> usize {
    3 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are uppercase with underscore separators.
    /// Example: `POLICY_DIRS`, `LOG_LEVEL`, etc.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Config = envy::from_env()?;
        config.validate()
    }

    /// Same as [`Config::from_env`] over an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Config = envy::from_iter(vars)?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        self.tls_paths()?;
        if self.policy_roots().is_empty() {
            return Err(ConfigError::Invalid("POLICY_DIRS names no directory".to_string()));
        }
        if self.package_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("PACKAGE_PREFIX must not be empty".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("REQUEST_TIMEOUT_MS must be positive".to_string()));
        }
        if self.log_format != "json" && self.log_format != "pretty" {
            return Err(ConfigError::Invalid(format!(
                "LOG_FORMAT must be 'json' or 'pretty', got '{}'",
                self.log_format
            )));
        }
        Ok(self)
    }

    /// Directories named by `POLICY_DIRS`.
    ///
    /// Accepts both `a,b` and the `PATH`-style list of the platform
    /// (`a:b` on Unix, `a;b` on Windows), mixed freely.
    pub fn policy_roots(&self) -> Vec<PathBuf> {
        self.policy_dirs
            .split(',')
            .flat_map(|entry| std::env::split_paths(entry.trim()).collect::<Vec<_>>())
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect()
    }

    /// Certificate and key paths when TLS is configured.
    pub fn tls_paths(&self) -> Result<Option<(PathBuf, PathBuf)>, ConfigError> {
        let set = |path: &Option<PathBuf>| path.clone().filter(|p| !p.as_os_str().is_empty());
        match (set(&self.tls_cert_file), set(&self.tls_key_file)) {
            (Some(cert), Some(key)) => Ok(Some((cert, key))),
            (None, None) => Ok(None),
            _ => Err(ConfigError::TlsIncomplete),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// `None` when periodic reload is disabled.
    pub fn reload_interval(&self) -> Option<Duration> {
        (self.policy_reload_interval_secs > 0)
            .then(|| Duration::from_secs(self.policy_reload_interval_secs))
    }
}
