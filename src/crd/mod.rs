//! # Custom Resource Definitions
//!
//! CRD types for the PodAutoscaler controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - Main CRD specification, target reference and defaults
//! - `status.rs` - Status types for tracking replica counts and conditions

mod spec;
mod status;

// Re-export all public types
pub use spec::{PodAutoscaler, PodAutoscalerSpec, ScaleTargetRef};
pub use status::{Condition, ConditionStatus, PodAutoscalerStatus};
