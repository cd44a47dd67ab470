//! # Runtime
//!
//! Process wiring for the controller binary.
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server and client setup
//! - `watch_loop`: the kube-runtime controller driving reconciles
//! - `error_policy`: per-key Fibonacci backoff for failed reconciles

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
