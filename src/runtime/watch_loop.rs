//! # Watch Loop
//!
//! Controller watch loop that monitors PodAutoscaler resources, and the
//! HPAs they own, and triggers reconciliation when changes are detected.
//!
//! The kube-runtime controller guarantees one in-flight reconcile per key;
//! distinct keys run in parallel up to `max_concurrent_reconciliations`.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::PodAutoscaler;
use crate::runtime::error_policy::handle_reconciliation_error;
use futures::StreamExt;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::{api::Api, Client};
use kube_runtime::{controller, watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the controller until a shutdown signal arrives
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let autoscalers: Api<PodAutoscaler> = Api::all(client.clone());
    let hpas: Api<HorizontalPodAutoscaler> = Api::all(client);
    let concurrency = reconciler.config.max_concurrent_reconciliations;

    let watch_span = tracing::span!(
        tracing::Level::INFO,
        "controller.watch",
        operation = "watch_loop",
        concurrency,
    );

    info!("Starting controller watch loop...");
    server_state.set_ready(true);

    Controller::new(autoscalers, watcher::Config::default().any_semantic())
        .owns(hpas, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| {
            match result {
                Ok((obj, action)) => {
                    debug!(resource = %obj, action = ?action, "watch.event.reconciled");
                }
                Err(e) => {
                    warn!(error = %e, "controller stream error");
                }
            }
            futures::future::ready(())
        })
        .instrument(watch_span)
        .await;

    server_state.set_ready(false);
    info!("Controller stopped gracefully");
    Ok(())
}
