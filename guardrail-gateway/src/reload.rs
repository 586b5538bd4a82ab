// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use guardrail_policy_engine::policy::{
    PolicyLoadError, PolicyLoader, RuleBackend, Snapshot, SnapshotStore,
};
use tokio::sync::broadcast;

use crate::metrics::Metrics;

/// Rebuilds the policy snapshot from disk and publishes it.
///
/// Triggered by SIGHUP and, when configured, on a fixed interval. Both the
/// rule files and the data file are read again on every reload. A failed
/// load is logged and counted; the previously published snapshot keeps
/// serving.
pub struct PolicyReloader<B: RuleBackend> {
    backend: Arc<B>,
    data_file: Option<PathBuf>,
    roots: Vec<PathBuf>,
    store: Arc<SnapshotStore<B::Module>>,
    metrics: Metrics,
    interval: Option<Duration>,
}

impl<B: RuleBackend> PolicyReloader<B> {
    pub fn new(
        backend: Arc<B>,
        data_file: Option<PathBuf>,
        roots: Vec<PathBuf>,
        store: Arc<SnapshotStore<B::Module>>,
        metrics: Metrics,
        interval: Option<Duration>,
    ) -> Self {
        Self {
            backend,
            data_file,
            roots,
            store,
            metrics,
            interval,
        }
    }

    fn load(&self) -> Result<Snapshot<B::Module>, PolicyLoadError> {
        let loader = PolicyLoader::from_shared(Arc::clone(&self.backend));
        let loader = match self.data_file.as_deref() {
            Some(path) => loader.with_data_file(path)?,
            None => loader,
        };
        loader.load(&self.roots)
    }

    /// Load every root and publish the result. Returns the new generation.
    pub fn reload(&self) -> Result<u64, PolicyLoadError> {
        match self.load() {
            Ok(snapshot) => {
                let modules = snapshot.module_count();
                let packages = snapshot.package_count();
                let generation = self.store.publish(snapshot);
                self.metrics.record_reload(true);
                self.metrics.set_snapshot(modules, generation);
                tracing::info!(generation, modules, packages, "policy snapshot published");
                Ok(generation)
            }
            Err(err) => {
                self.metrics.record_reload(false);
                tracing::error!(
                    error = %err,
                    path = %err.path().display(),
                    generation = self.store.generation(),
                    "policy reload failed, keeping the current snapshot"
                );
                Err(err)
            }
        }
    }

    /// Run until a shutdown signal is received.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = self.interval.map(|period| {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker
        });
        let mut hangup = Hangup::install();

        tracing::info!(
            interval_secs = self.interval.map(|i| i.as_secs()),
            "policy reloader started"
        );

        loop {
            tokio::select! {
                _ = next_tick(&mut ticker) => {
                    tracing::debug!(trigger = "interval", "reloading policies");
                }
                _ = hangup.recv() => {
                    tracing::info!(trigger = "sighup", "reloading policies");
                }
                _ = shutdown.recv() => {
                    tracing::debug!("policy reloader shutting down");
                    break;
                }
            }

            let reloader = Arc::clone(&self);
            // Errors are logged and counted inside reload()
            if let Err(err) = tokio::task::spawn_blocking(move || reloader.reload()).await {
                tracing::error!(error = %err, "policy reload task failed");
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// SIGHUP listener. Never fires where signals are unavailable.
struct Hangup {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl Hangup {
    fn install() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let signal = match signal(SignalKind::hangup()) {
                Ok(signal) => Some(signal),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to install SIGHUP handler");
                    None
                }
            };
            Self { signal }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        if let Some(signal) = self.signal.as_mut() {
            if signal.recv().await.is_some() {
                return;
            }
            self.signal = None;
        }
        std::future::pending::<()>().await
    }
}
