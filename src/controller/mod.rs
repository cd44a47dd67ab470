//! # Controller
//!
//! Core controller modules for the PodAutoscaler controller.
//!
//! - `backoff`: Fibonacci backoff for retries
//! - `events`: Kubernetes Event publishing
//! - `reconciler`: Core reconciliation logic
//! - `scale`: Scale target resolution through the `scale` subresource
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod events;
pub mod reconciler;
pub mod scale;
pub mod server;
