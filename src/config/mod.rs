//! # Configuration
//!
//! Controller configuration, built once at start-up and passed to every
//! component that needs it.
//!
//! - `controller`: controller-level settings loaded from environment variables

mod controller;

pub use controller::{ControllerConfig, LogFormat};
