//! # Cloud Connectors Controller
//!
//! Runs one controller per enabled connector kind in a single process.
//!
//! ```bash
//! cloud-connectors-controller --kinds queue,storage --metrics-port 5000
//! ```

use anyhow::Result;
use clap::{Parser, ValueEnum};
use cloud_connectors::config::ControllerConfig;
use cloud_connectors::crd::{YandexContainerRegistry, YandexMessageQueue, YandexObjectStorage};
use cloud_connectors::provider::queue::MessageQueueAdapter;
use cloud_connectors::provider::registry::ContainerRegistryAdapter;
use cloud_connectors::provider::storage::ObjectStorageAdapter;
use cloud_connectors::runtime::{initialize, run_controller, watched_api};
use futures::future::join_all;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum ConnectorKind {
    /// Yandex Container Registry
    Registry,
    /// Yandex Message Queue
    Queue,
    /// Yandex Object Storage
    Storage,
}

#[derive(Parser, Debug)]
#[command(name = "cloud-connectors-controller")]
#[command(about = "Provision Yandex Cloud resources from Kubernetes custom resources", long_about = None)]
#[command(version)]
struct Cli {
    /// Connector kinds to run
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = [ConnectorKind::Registry, ConnectorKind::Queue, ConnectorKind::Storage]
    )]
    kinds: Vec<ConnectorKind>,

    /// Port for /metrics, /healthz and /readyz (overrides METRICS_PORT)
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ControllerConfig::from_env();
    if let Some(port) = cli.metrics_port {
        config.metrics_port = port;
    }

    let init = initialize(config).await?;
    let config = Arc::clone(&init.config);

    let mut kinds = cli.kinds;
    kinds.sort();
    kinds.dedup();

    let mut controllers = Vec::new();
    for kind in kinds {
        info!(kind = ?kind, "Enabling connector");
        match kind {
            ConnectorKind::Registry => {
                let reconciler = init.reconciler::<YandexContainerRegistry>(Arc::new(
                    ContainerRegistryAdapter::new(&config)?,
                ));
                let api = watched_api(init.client.clone(), &config);
                controllers.push(tokio::spawn(run_controller(api, reconciler)));
            }
            ConnectorKind::Queue => {
                let reconciler = init
                    .reconciler::<YandexMessageQueue>(Arc::new(MessageQueueAdapter::new(&config)));
                let api = watched_api(init.client.clone(), &config);
                controllers.push(tokio::spawn(run_controller(api, reconciler)));
            }
            ConnectorKind::Storage => {
                let reconciler = init
                    .reconciler::<YandexObjectStorage>(Arc::new(ObjectStorageAdapter::new(&config)));
                let api = watched_api(init.client.clone(), &config);
                controllers.push(tokio::spawn(run_controller(api, reconciler)));
            }
        }
    }

    init.server_state.set_ready(true);

    for result in join_all(controllers).await {
        if let Err(e) = result {
            tracing::error!("Controller task failed: {}", e);
        }
    }

    init.server_state.set_ready(false);
    info!("Controller stopped gracefully");
    Ok(())
}
