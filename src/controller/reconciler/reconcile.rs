//! # Reconcile
//!
//! Entry point invoked by the controller runtime for each queued key.
//!
//! ```text
//! Load ─┬─ NotFound ──────────────────────────────► converged
//!       └─ Found ─► dispatch by strategy ─┬─ HPA ─► mirror HPA
//!                                         ├─ KPA ─► decide, clamp, rescale
//!                                         └─ APA ─► fail fast
//! ```
//!
//! The whole invocation runs under the configured deadline. Errors are
//! returned to the error policy, which owns requeue and backoff.

use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::reconciler::{decision, delegated};
use crate::crd::PodAutoscaler;
use crate::observability;
use crate::scaler::ScalingStrategy;
use chrono::Utc;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::{Arc, PoisonError};
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

/// Reconcile one PodAutoscaler
///
/// The watched object only supplies the key; the latest version is loaded
/// from the API so that status writes are made against a current
/// resourceVersion.
pub async fn reconcile(
    pa: Arc<PodAutoscaler>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let namespace = pa.namespace().unwrap_or_default();
    let name = pa.name_any();
    let span = info_span!(
        "reconcile",
        resource.namespace = %namespace,
        resource.name = %name,
        strategy = %pa.spec.scaling_strategy,
    );

    observability::metrics::increment_reconciliations();
    let start = Instant::now();
    let deadline = ctx.config.reconcile_timeout();

    let result = match tokio::time::timeout(deadline, reconcile_key(&ctx, &namespace, &name))
        .instrument(span)
        .await
    {
        Ok(result) => result,
        Err(_) => {
            warn!(resource.namespace = %namespace, resource.name = %name, "reconcile deadline exceeded");
            Err(ReconcilerError::Timeout(deadline))
        }
    };

    observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    if result.is_ok() {
        reset_backoff(&ctx, &namespace, &name);
    }
    result
}

/// Reconcile the PodAutoscaler stored under `namespace/name`
pub async fn reconcile_key(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<Action, ReconcilerError> {
    let Some(pa) = ctx
        .store
        .get_autoscaler(namespace, name)
        .await
        .map_err(ReconcilerError::Kube)?
    else {
        debug!("PodAutoscaler no longer exists, nothing to reconcile");
        ctx.scalers.forget(namespace, name);
        return Ok(Action::await_change());
    };

    let strategy: ScalingStrategy = pa.spec.scaling_strategy.parse()?;
    let now = Utc::now();

    match strategy {
        ScalingStrategy::Hpa => delegated::reconcile_hpa(ctx, &pa, now).await,
        ScalingStrategy::Kpa => decision::reconcile_decision(ctx, &pa, now).await,
        ScalingStrategy::Apa => Err(ReconcilerError::UnimplementedStrategy(strategy)),
    }
}

fn reset_backoff(ctx: &Reconciler, namespace: &str, name: &str) {
    let mut states = ctx
        .backoff_states
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(state) = states.get_mut(&format!("{namespace}/{name}")) {
        state.reset();
    }
}
