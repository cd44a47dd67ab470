//! # PodAutoscaler Controller
//!
//! A Kubernetes controller that keeps workloads at the replica count chosen
//! by their PodAutoscaler's strategy.
//!
//! - **HPA**: mirrors the PodAutoscaler into a `HorizontalPodAutoscaler` and
//!   reports its status back
//! - **KPA**: decides in-process with a stable/panic window strategy and
//!   patches the target's `scale` subresource
//!
//! Targets can be any kind that serves `scale`: Deployments, StatefulSets,
//! or custom resources.

use anyhow::Result;
use podautoscaler_controller::runtime::{initialization::initialize, watch_loop::run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init.client, init.reconciler, init.server_state).await
}
