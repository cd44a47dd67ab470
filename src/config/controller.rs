//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    CONTROLLER_NAME, DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS,
    DEFAULT_DECISION_RESYNC_SECS, DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
    DEFAULT_MAX_SCALE_DOWN_RATE, DEFAULT_MAX_SCALE_UP_RATE, DEFAULT_METRICS_PORT,
    DEFAULT_PANIC_THRESHOLD, DEFAULT_PANIC_WINDOW_PERCENTAGE, DEFAULT_RECONCILE_TIMEOUT_SECS,
    DEFAULT_STABLE_WINDOW_SECS,
};
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("text") {
            LogFormat::Text
        } else {
            LogFormat::Json
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// HTTP port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Deadline for one reconcile invocation (seconds)
    /// Exceeding it aborts the invocation and hands it back to the error policy
    pub reconcile_timeout_secs: u64,
    /// How often decision strategies are re-evaluated without a watch event (seconds)
    pub decision_resync_secs: u64,
    /// Error backoff floor (seconds)
    pub backoff_min_secs: u64,
    /// Error backoff ceiling (seconds)
    pub backoff_max_secs: u64,
    /// Field manager used for server-side apply of scale handles and HPA mirrors
    pub field_manager: String,
    /// Maximum concurrent reconciliations
    /// Limits how many distinct autoscalers can be reconciled simultaneously
    pub max_concurrent_reconciliations: u16,
    /// Log format (json, text)
    pub log_format: LogFormat,
    /// Windowed strategy: stable window length (seconds)
    pub stable_window_secs: u64,
    /// Windowed strategy: panic window as a percentage of the stable window
    pub panic_window_percentage: f64,
    /// Windowed strategy: panic threshold as a multiple of ready replicas
    pub panic_threshold: f64,
    /// Windowed strategy: maximum scale-up factor per decision
    pub max_scale_up_rate: f64,
    /// Windowed strategy: maximum scale-down divisor per decision
    pub max_scale_down_rate: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            decision_resync_secs: DEFAULT_DECISION_RESYNC_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            field_manager: CONTROLLER_NAME.to_string(),
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            log_format: LogFormat::Json,
            stable_window_secs: DEFAULT_STABLE_WINDOW_SECS,
            panic_window_percentage: DEFAULT_PANIC_WINDOW_PERCENTAGE,
            panic_threshold: DEFAULT_PANIC_THRESHOLD,
            max_scale_up_rate: DEFAULT_MAX_SCALE_UP_RATE,
            max_scale_down_rate: DEFAULT_MAX_SCALE_DOWN_RATE,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Unparseable values fall back to their defaults, as do windowed strategy
    /// factors that are not finite and positive.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            metrics_port: parse_or(&lookup, "METRICS_PORT", defaults.metrics_port),
            reconcile_timeout_secs: parse_or(
                &lookup,
                "RECONCILE_TIMEOUT_SECS",
                defaults.reconcile_timeout_secs,
            ),
            decision_resync_secs: parse_or(
                &lookup,
                "DECISION_RESYNC_SECS",
                defaults.decision_resync_secs,
            ),
            backoff_min_secs: parse_or(&lookup, "BACKOFF_MIN_SECS", defaults.backoff_min_secs),
            backoff_max_secs: parse_or(&lookup, "BACKOFF_MAX_SECS", defaults.backoff_max_secs),
            field_manager: lookup("FIELD_MANAGER").unwrap_or(defaults.field_manager),
            max_concurrent_reconciliations: parse_or(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            log_format: lookup("LOG_FORMAT")
                .map_or(defaults.log_format, |v| LogFormat::parse(&v)),
            stable_window_secs: parse_or(
                &lookup,
                "STABLE_WINDOW_SECS",
                defaults.stable_window_secs,
            ),
            panic_window_percentage: positive_or(
                &lookup,
                "PANIC_WINDOW_PERCENTAGE",
                defaults.panic_window_percentage,
            ),
            panic_threshold: positive_or(&lookup, "PANIC_THRESHOLD", defaults.panic_threshold),
            max_scale_up_rate: positive_or(
                &lookup,
                "MAX_SCALE_UP_RATE",
                defaults.max_scale_up_rate,
            ),
            max_scale_down_rate: positive_or(
                &lookup,
                "MAX_SCALE_DOWN_RATE",
                defaults.max_scale_down_rate,
            ),
        }
    }

    /// Get reconcile deadline duration
    #[must_use]
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Get decision resync duration
    #[must_use]
    pub fn decision_resync(&self) -> Duration {
        Duration::from_secs(self.decision_resync_secs)
    }

    /// Get stable window duration
    #[must_use]
    pub fn stable_window(&self) -> Duration {
        Duration::from_secs(self.stable_window_secs)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn positive_or<F>(lookup: &F, key: &str, default: f64) -> f64
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default);
    if value.is_finite() && value > 0.0 {
        value
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = ControllerConfig::from_lookup(|_| None);
        assert_eq!(config.reconcile_timeout(), Duration::from_secs(10));
        assert_eq!(config.metrics_port, 8080);
        assert_eq!(config.field_manager, "podautoscaler-controller");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("RECONCILE_TIMEOUT_SECS", "3"),
            ("FIELD_MANAGER", "custom"),
            ("LOG_FORMAT", "TEXT"),
            ("PANIC_THRESHOLD", "3.5"),
        ]));
        assert_eq!(config.reconcile_timeout(), Duration::from_secs(3));
        assert_eq!(config.field_manager, "custom");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!((config.panic_threshold - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("METRICS_PORT", "not-a-port"),
            ("BACKOFF_MAX_SECS", "-1"),
        ]));
        assert_eq!(config.metrics_port, 8080);
        assert_eq!(config.backoff_max_secs, 300);
    }

    #[test]
    fn test_non_finite_scaler_factors_fall_back() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("PANIC_WINDOW_PERCENTAGE", "NaN"),
            ("PANIC_THRESHOLD", "inf"),
            ("MAX_SCALE_UP_RATE", "-inf"),
            ("MAX_SCALE_DOWN_RATE", "0"),
        ]));
        let d = ControllerConfig::default();
        assert!((config.panic_window_percentage - d.panic_window_percentage).abs() < f64::EPSILON);
        assert!((config.panic_threshold - d.panic_threshold).abs() < f64::EPSILON);
        assert!((config.max_scale_up_rate - d.max_scale_up_rate).abs() < f64::EPSILON);
        assert!((config.max_scale_down_rate - d.max_scale_down_rate).abs() < f64::EPSILON);
    }
}
