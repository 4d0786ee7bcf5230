//! Runtime settings shared by the loops and the server.

use std::path::PathBuf;
use std::time::Duration;

use crate::alert::AlertThresholds;
use crate::store::DEFAULT_EVENT_CAPACITY;

/// Tunables for a dashboard process. `Default` matches the stock dashboard.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Directory for the hourly telemetry logs.
    pub log_dir: PathBuf,
    /// Delay between telemetry ticks.
    pub sample_interval: Duration,
    /// Delay between fault-code scans.
    pub fault_interval: Duration,
    /// Upper bound on a single diagnostic query.
    pub query_timeout: Duration,
    /// Events buffered per subscriber before the oldest are dropped.
    pub event_capacity: usize,
    pub thresholds: AlertThresholds,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            sample_interval: Duration::from_millis(500),
            fault_interval: Duration::from_secs(900),
            query_timeout: Duration::from_secs(2),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            thresholds: AlertThresholds::default(),
        }
    }
}
