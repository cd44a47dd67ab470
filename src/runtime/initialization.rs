//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, metrics, server
//! startup, and Kubernetes client setup.

use crate::config::{ControllerConfig, LogFormat};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::metrics::InMemoryMetricsClient;
use crate::observability;
use anyhow::{anyhow, Context, Result};
use kube::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const SERVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
const SERVER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything opens a TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let config = ControllerConfig::from_env();
    init_tracing(config.log_format)?;

    info!("Starting PodAutoscaler controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_bound(&server_handle, server_port).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    // Samples are pushed by external producers; with none recorded, decision
    // strategies report FailedComputeMetricsReplicas
    let metrics_client = Arc::new(InMemoryMetricsClient::new());
    let reconciler = Arc::new(Reconciler::new(
        client.clone(),
        config.clone(),
        metrics_client,
    ));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
        config,
    })
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("podautoscaler_controller=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow!("Failed to initialize tracing subscriber: {e}"))
}

/// Wait until the HTTP server accepts connections
///
/// Readiness stays false until the watch loop starts; this only checks that
/// the listener is bound so probes get an answer.
async fn wait_for_server_bound(
    server_handle: &tokio::task::JoinHandle<()>,
    port: u16,
) -> Result<()> {
    let start_time = Instant::now();
    loop {
        if server_handle.is_finished() {
            return Err(anyhow!("HTTP server failed to start"));
        }
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            info!("HTTP server is accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > SERVER_STARTUP_TIMEOUT {
            return Err(anyhow!(
                "HTTP server failed to bind within {} seconds",
                SERVER_STARTUP_TIMEOUT.as_secs()
            ));
        }
        tokio::time::sleep(SERVER_POLL_INTERVAL).await;
    }
}
