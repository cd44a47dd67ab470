//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable (see [`crate::config::ControllerConfig`]).

/// Name the controller reports in events and uses as its server-side apply field manager
pub const CONTROLLER_NAME: &str = "podautoscaler-controller";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Wall-clock deadline for a single reconcile invocation (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 10;

/// Re-evaluation interval for decision strategies (seconds)
/// Metric changes do not produce watch events, so decision paths requeue themselves
pub const DEFAULT_DECISION_RESYNC_SECS: u64 = 15;

/// Minimum error backoff (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Maximum error backoff (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Maximum concurrent reconciliations across distinct keys
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Minimum replicas when `minReplicas` is omitted from the spec
pub const DEFAULT_MIN_REPLICAS: i32 = 1;

/// Container port the target metric is exposed on when `metricsPort` is omitted
pub const DEFAULT_METRICS_CONTAINER_PORT: i32 = 8000;

/// Windowed strategy: stable window length (seconds)
pub const DEFAULT_STABLE_WINDOW_SECS: u64 = 60;

/// Windowed strategy: panic window as a percentage of the stable window
pub const DEFAULT_PANIC_WINDOW_PERCENTAGE: f64 = 10.0;

/// Windowed strategy: panic is entered when the panic recommendation reaches
/// this multiple of the current ready replicas
pub const DEFAULT_PANIC_THRESHOLD: f64 = 2.0;

/// Windowed strategy: maximum scale-up factor per decision
pub const DEFAULT_MAX_SCALE_UP_RATE: f64 = 1000.0;

/// Windowed strategy: maximum scale-down divisor per decision
pub const DEFAULT_MAX_SCALE_DOWN_RATE: f64 = 2.0;
