//! # Reconciler
//!
//! Drives PodAutoscalers toward the replica count chosen by their strategy.
//!
//! ## Module Structure
//!
//! - `types.rs` - Reconciler context, error taxonomy, backoff state
//! - `store.rs` - PodAutoscaler and HPA mirror persistence
//! - `status.rs` - Condition upserts and change-gated status writes
//! - `reconcile.rs` - Entry point, deadline, strategy dispatch
//! - `decision.rs` - In-controller decision path (bounds, rescale, events)
//! - `delegated.rs` - HPA mirror path

pub mod decision;
pub mod delegated;
pub mod reconcile;
pub mod status;
pub mod store;
pub mod types;

pub use reconcile::{reconcile, reconcile_key};
pub use store::{AutoscalerStore, KubeAutoscalerStore, StoreError};
pub use types::{BackoffState, Reconciler, ReconcilerError};
