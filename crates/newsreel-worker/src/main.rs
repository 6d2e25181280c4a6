//! Newsreel pipeline worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsreel_store::{FirestoreTaskStore, MemoryTaskStore, TaskBoard, TaskStore};
use newsreel_worker::{metrics, Collaborators, Pipeline, StoreBackend, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("newsreel=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting newsreel-worker");

    let config = match WorkerConfig::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Invalid worker configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Worker config: {:?}", config);

    if let Some(port) = std::env::var("METRICS_PORT").ok().and_then(|p| p.parse().ok()) {
        match metrics::init_prometheus(port) {
            Ok(()) => info!(port, "Prometheus exporter listening"),
            Err(e) => warn!("Metrics disabled: {}", e),
        }
    }

    let store: Arc<dyn TaskStore> = match config.store_backend {
        StoreBackend::Memory => {
            warn!("Using in-memory task store; tasks are lost on exit");
            Arc::new(MemoryTaskStore::new())
        }
        StoreBackend::Firestore => match FirestoreTaskStore::from_env().await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to create Firestore task store: {}", e);
                std::process::exit(1);
            }
        },
    };
    let board = TaskBoard::new(store).with_claim_timeout(config.claim_timeout);

    let collaborators = match Collaborators::from_env(&config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to set up collaborators: {}", e);
            std::process::exit(1);
        }
    };

    let pipeline = Pipeline::standard(config.clone(), board, collaborators);
    info!(stages = ?pipeline.stage_names(), "Pipeline ready");

    if config.run_once {
        let report = pipeline.run_cycle().await;
        info!(errors = report.errors.len(), "Single cycle complete");
        return Ok(());
    }

    // A cycle in progress finishes before shutdown
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            _ = interval.tick() => {
                pipeline.run_cycle().await;
            }
        }
    }

    info!("Worker shutdown complete");
    Ok(())
}
