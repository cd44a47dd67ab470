//! # Error Policy
//!
//! Error handling and backoff for the controller watch loop.
//!
//! Backoff state is tracked per `namespace/name` so one failing autoscaler
//! never slows down retries of another. A successful reconcile resets it.
//! Errors that only an edit of the PodAutoscaler can clear are not retried;
//! the edit itself triggers the next reconcile.

use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::PodAutoscaler;
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tracing::{error, info};

/// Handle reconciliation errors with Fibonacci backoff
pub fn handle_reconciliation_error(
    obj: Arc<PodAutoscaler>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %name,
        resource.namespace = %namespace,
        error.kind = error.kind(),
    );
    let _error_guard = error_span.enter();

    error!(error = %error, "reconciliation failed");
    observability::metrics::increment_reconciliation_errors(error.kind());

    if !error.is_retryable() {
        info!("waiting for the PodAutoscaler to change before retrying");
        return Action::await_change();
    }

    let (backoff_seconds, error_count) = {
        let mut states = ctx
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states
            .entry(format!("{namespace}/{name}"))
            .or_insert_with(|| BackoffState::new(&ctx.config));
        state.increment_error();
        (state.backoff.next_backoff_seconds(), state.error_count)
    };

    info!(
        backoff_secs = backoff_seconds,
        error_count,
        trigger_source = "error-backoff",
        "retrying with Fibonacci backoff"
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}
