//! # Initialization
//!
//! Process-wide setup shared by every connector kind: rustls, tracing,
//! metrics, the probe server and the Kubernetes client.

use crate::config::ControllerConfig;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::ManagedResource;
use crate::observability;
use crate::provider::{CloudResourceAdapter, CredentialsProvider, KubeCredentialsProvider};
use crate::store::{ArtifactStore, ConfigMapArtifactStore, KubeObjectStore};
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{error, info};

/// Shared components every controller is built from
pub struct InitializationResult {
    pub client: Client,
    pub config: Arc<ControllerConfig>,
    pub server_state: Arc<ServerState>,
    pub credentials: Arc<dyn CredentialsProvider>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InitializationResult {
    /// Reconciler for kind `K` backed by the Kubernetes API and `adapter`
    pub fn reconciler<K: ManagedResource>(
        &self,
        adapter: Arc<dyn CloudResourceAdapter<Params = K::Params>>,
    ) -> Arc<Reconciler<K>> {
        Arc::new(Reconciler::new(
            Arc::new(KubeObjectStore::<K>::new(self.client.clone())),
            Arc::clone(&self.artifacts),
            adapter,
            Arc::clone(&self.credentials),
            Arc::clone(&self.config),
        ))
    }
}

/// Initialize the controller runtime
///
/// # Errors
/// Fails when metrics cannot be registered or the Kubernetes client cannot be created.
pub async fn initialize(config: ControllerConfig) -> Result<InitializationResult> {
    // Required for rustls 0.23+ when no default provider is set via features.
    // An Err only means a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    observability::init_tracing(&config);

    info!("Starting Cloud Connectors Controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_port = config.metrics_port;
    let server_state_clone = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let credentials = KubeCredentialsProvider::new(client.clone(), &config)
        .context("Failed to create credentials provider")?;

    Ok(InitializationResult {
        artifacts: Arc::new(ConfigMapArtifactStore::new(client.clone())),
        credentials: Arc::new(credentials),
        client,
        config: Arc::new(config),
        server_state,
    })
}
