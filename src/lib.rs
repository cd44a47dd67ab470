//! PodAutoscaler Controller Library
//!
//! Drives any workload that serves the `scale` subresource toward a replica
//! count chosen by a pluggable autoscaling strategy.
//!
//! ## Quick Start
//!
//! ```rust
//! use podautoscaler_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod metrics;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod scaler;
