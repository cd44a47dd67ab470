//! # Windowed Scaler
//!
//! Dual-window decision strategy for bursty inference traffic.
//!
//! The observed value is the total load across the target's pods; dividing
//! it by the per-replica target gives the pods needed. Two averages are kept
//! over the recorded samples:
//!
//! - the **stable** window (default 60s) smooths the signal and governs scale-down
//! - the **panic** window (a fraction of the stable window) reacts to spikes
//!
//! When the panic recommendation reaches `panic_threshold` times the current
//! replica count the scaler panics: it follows the panic window upward and
//! refuses to scale below the highest panic recommendation until a full
//! stable window passes without another trigger. Outside panic, a scale-down
//! only happens once every stable recommendation inside the window is below
//! the current count.

use super::{ScaleResult, Scaler};
use crate::config::ControllerConfig;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct WindowedScalerConfig {
    pub stable_window: Duration,
    /// Panic window as a percentage of the stable window
    pub panic_window_percentage: f64,
    /// Multiple of current replicas that triggers panic
    pub panic_threshold: f64,
    pub max_scale_up_rate: f64,
    pub max_scale_down_rate: f64,
    /// Per-replica target value of the metric
    pub target_value: f64,
}

impl WindowedScalerConfig {
    #[must_use]
    pub fn from_controller_config(config: &ControllerConfig) -> Self {
        Self {
            stable_window: config.stable_window(),
            panic_window_percentage: config.panic_window_percentage,
            panic_threshold: config.panic_threshold,
            max_scale_up_rate: config.max_scale_up_rate,
            max_scale_down_rate: config.max_scale_down_rate,
            target_value: 0.0,
        }
    }

    #[must_use]
    pub fn with_target(&self, target_value: f64) -> Self {
        Self {
            target_value,
            ..self.clone()
        }
    }

    /// Falls back to the whole stable window when the percentage is not a number
    fn panic_window(&self) -> Duration {
        let fraction = (self.panic_window_percentage / 100.0).clamp(0.0, 1.0);
        Duration::try_from_secs_f64(self.stable_window.as_secs_f64() * fraction)
            .unwrap_or(self.stable_window)
    }
}

#[derive(Debug)]
pub struct WindowedScaler {
    config: WindowedScalerConfig,
    samples: VecDeque<(DateTime<Utc>, f64)>,
    recommendations: VecDeque<(DateTime<Utc>, i32)>,
    panic_time: Option<DateTime<Utc>>,
    max_panic_pods: i32,
}

impl WindowedScaler {
    #[must_use]
    pub fn new(config: WindowedScalerConfig) -> Self {
        Self {
            config,
            samples: VecDeque::new(),
            recommendations: VecDeque::new(),
            panic_time: None,
            max_panic_pods: 0,
        }
    }

    #[must_use]
    pub fn in_panic(&self) -> bool {
        self.panic_time.is_some()
    }

    fn average_since(&self, cutoff: DateTime<Utc>) -> Option<f64> {
        let (sum, count) = self
            .samples
            .iter()
            .filter(|(ts, _)| *ts >= cutoff)
            .fold((0.0, 0_u32), |(sum, count), (_, v)| (sum + v, count + 1));
        (count > 0).then(|| sum / f64::from(count))
    }

    #[allow(clippy::cast_possible_truncation, reason = "bounded by the rate limits below")]
    fn pods_for(&self, average: f64) -> i32 {
        (average / self.config.target_value).ceil() as i32
    }
}

fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window).map_or(now, |w| now - w)
}

impl Scaler for WindowedScaler {
    #[allow(clippy::cast_possible_truncation, reason = "rate limits are clamped to i32")]
    fn scale(
        &mut self,
        current_replicas: i32,
        observed_value: f64,
        now: DateTime<Utc>,
    ) -> ScaleResult {
        if self.config.target_value <= 0.0 || !observed_value.is_finite() {
            return ScaleResult::invalid();
        }

        let stable_start = window_start(now, self.config.stable_window);
        let panic_start = window_start(now, self.config.panic_window());

        self.samples.push_back((now, observed_value));
        while self.samples.front().is_some_and(|(ts, _)| *ts < stable_start) {
            self.samples.pop_front();
        }

        let (Some(stable_avg), Some(panic_avg)) =
            (self.average_since(stable_start), self.average_since(panic_start))
        else {
            return ScaleResult::invalid();
        };

        let ready = f64::from(current_replicas.max(1));
        let max_up = (ready * self.config.max_scale_up_rate)
            .ceil()
            .min(f64::from(i32::MAX)) as i32;
        let max_down = (ready / self.config.max_scale_down_rate).floor() as i32;
        let limit = |pods: i32| pods.clamp(max_down.min(max_up), max_up);

        let stable_desired = limit(self.pods_for(stable_avg));
        let panic_desired = limit(self.pods_for(panic_avg));

        self.recommendations.push_back((now, stable_desired));
        while self
            .recommendations
            .front()
            .is_some_and(|(ts, _)| *ts < stable_start)
        {
            self.recommendations.pop_front();
        }

        let over_panic_threshold = f64::from(panic_desired) / ready >= self.config.panic_threshold;
        if over_panic_threshold {
            if self.panic_time.is_none() {
                info!(panic_desired, current_replicas, "entering panic mode");
            }
            self.panic_time = Some(now);
        } else if self.panic_time.is_some_and(|since| since < stable_start) {
            info!(current_replicas, "leaving panic mode");
            self.panic_time = None;
            self.max_panic_pods = 0;
        }

        let desired = if self.in_panic() {
            self.max_panic_pods = self.max_panic_pods.max(panic_desired);
            self.max_panic_pods
        } else {
            self.recommendations
                .iter()
                .map(|(_, pods)| *pods)
                .max()
                .unwrap_or(stable_desired)
        };

        debug!(
            stable_avg,
            panic_avg,
            stable_desired,
            panic_desired,
            desired,
            panicking = self.in_panic(),
            "windowed scaler decision"
        );
        ScaleResult::valid(desired)
    }
}
