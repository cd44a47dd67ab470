//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use podautoscaler_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (PodAutoscaler, PodAutoscalerStatus, etc.)
//! - The seams the reconciler is built on (ScaleClient, MetricsClient, AutoscalerStore, EventPublisher)
//! - Reconciler types (Reconciler, ReconcilerError, etc.)
//! - Strategy types (Scaler, ScalingStrategy, ScalerRegistry)

pub use crate::crd::*;

pub use crate::controller::events::EventPublisher;
pub use crate::controller::scale::{ResourceMapping, ScaleClient, ScaleError, ScaleHandle};
pub use crate::metrics::{MetricsClient, MetricsError, PodMetric, PodMetricsInfo};

pub use crate::controller::reconciler::{
    reconcile, reconcile_key, AutoscalerStore, BackoffState, Reconciler, ReconcilerError,
    StoreError,
};

pub use crate::scaler::{ScaleResult, Scaler, ScalerRegistry, ScalingStrategy};

pub use crate::config::ControllerConfig;
