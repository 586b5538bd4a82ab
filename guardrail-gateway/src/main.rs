// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use guardrail_policy_engine::policy::{BackendKind, PolicyLoader, RuleBackend, SnapshotStore};
use guardrail_policy_engine::rego::RegoRuleBackend;
use guardrail_policy_engine::yaml::YamlRuleBackend;

mod admission;
mod config;
mod handlers;
mod metrics;
mod reload;
mod state;
#[cfg(test)]
mod testing;

use config::Config;
use metrics::Metrics;
use reload::PolicyReloader;
use state::GatewayState;

/// In-flight requests get this long to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    init_tracing(&config);

    tracing::info!(
        host = %config.host,
        port = config.port,
        policy_dirs = %config.policy_dirs,
        policy_backend = %config.policy_backend,
        package_prefix = %config.package_prefix,
        unresolved_policy = %config.unresolved_policy,
        "starting guardrail-gateway"
    );

    match config.policy_backend {
        BackendKind::Yaml => serve(config, YamlRuleBackend).await?,
        BackendKind::Rego => serve(config, RegoRuleBackend).await?,
    }

    tracing::info!("guardrail-gateway stopped");
    Ok(())
}

async fn serve<B: RuleBackend>(config: Config, backend: B) -> Result<()> {
    let metrics = Metrics::new();

    let mut loader = PolicyLoader::new(backend);
    if let Some(path) = &config.policy_data_file {
        loader = loader.with_data_file(path)?;
    }

    // A broken policy tree at startup is fatal; later reloads are not.
    let roots = config.policy_roots();
    let snapshot = loader
        .load(&roots)
        .context("failed to load initial policy snapshot")?;
    let store = Arc::new(SnapshotStore::new(snapshot));
    metrics.set_snapshot(store.current().module_count(), store.generation());

    let tls = config.tls_paths()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let config = Arc::new(config);

    let state = GatewayState::new(
        Arc::clone(&store),
        loader.evaluator(),
        Arc::clone(&config),
        metrics.clone(),
    );
    let app = handlers::router(state);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let reloader = Arc::new(PolicyReloader::new(
        Arc::clone(loader.backend()),
        config.policy_data_file.clone(),
        roots,
        store,
        metrics,
        config.reload_interval(),
    ));
    tokio::spawn(reloader.run(shutdown_tx.subscribe()));

    let mut server_shutdown_rx = shutdown_tx.subscribe();
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received, initiating graceful shutdown");
        let _ = shutdown_tx_clone.send(());
    });

    match tls {
        Some((cert, key)) => {
            let tls_config = RustlsConfig::from_pem_file(&cert, &key)
                .await
                .with_context(|| format!("failed to load TLS material from {}", cert.display()))?;

            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                let _ = server_shutdown_rx.recv().await;
                shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            tracing::info!(address = %addr, tls = true, "listening for connections");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = TcpListener::bind(addr).await?;
            tracing::info!(address = %addr, tls = false, "listening for connections");
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown_rx.recv().await;
                })
                .await?;
        }
    }

    Ok(())
}

/// Initialize tracing based on configuration.
fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
