//! The two periodic loops that keep the store current.
//!
//! - [`TelemetryLoop`]: sample, store, log, publish `sensor_update`, then alerts
//! - [`FaultLoop`]: read trouble codes, replace the list, publish `error_update`
//!
//! Both are fixed-delay: the next tick starts one period after the previous
//! tick finished. Neither loop ever exits on error; they stop only when their
//! [`CancellationToken`] is cancelled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::alert::{AlertThresholds, evaluate};
use crate::channel::TelemetrySnapshot;
use crate::clock::Clock;
use crate::event::DashboardEvent;
use crate::faults::FaultReader;
use crate::logfile::HourlyLog;
use crate::sampler::{SampleSource, Sampler};
use crate::store::Store;

/// Outcome of one telemetry tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub source: SampleSource,
    pub snapshot: TelemetrySnapshot,
    /// Alerts published this tick.
    pub alerts: usize,
    /// Whether the log entry was written.
    pub logged: bool,
    pub elapsed: Duration,
}

/// Fast loop: one snapshot per period.
pub struct TelemetryLoop {
    sampler: Sampler,
    log: HourlyLog,
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    thresholds: AlertThresholds,
    period: Duration,
}

impl TelemetryLoop {
    pub fn new(
        sampler: Sampler,
        log: HourlyLog,
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> Self {
        Self {
            sampler,
            log,
            store,
            clock,
            thresholds: AlertThresholds::default(),
            period,
        }
    }

    pub fn with_thresholds(mut self, thresholds: AlertThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn log(&self) -> &HourlyLog {
        &self.log
    }

    /// Run a single iteration.
    pub async fn tick(&mut self) -> TickReport {
        let t0 = Instant::now();
        let (snapshot, source) = self.sampler.sample().await;
        self.store.update_snapshot(snapshot);

        let now = self.clock.now();
        let logged = match self.log.record(now, snapshot) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("telemetry log write failed, entry skipped: {e}");
                false
            }
        };

        self.store.publish(DashboardEvent::SensorUpdate(snapshot));

        let alerts = evaluate(&snapshot, &self.thresholds);
        let alert_count = alerts.len();
        for alert in alerts {
            log::debug!("alert: {} ({})", alert.message, alert.value);
            self.store.publish(DashboardEvent::Alert(alert));
        }

        TickReport {
            source,
            snapshot,
            alerts: alert_count,
            logged,
            elapsed: t0.elapsed(),
        }
    }

    /// Tick until `shutdown` is cancelled. The first tick runs immediately.
    pub async fn run(mut self, shutdown: CancellationToken) {
        log::info!(
            "telemetry loop started ({}ms, {})",
            self.period.as_millis(),
            if self.sampler.is_live() { "live" } else { "simulated" }
        );
        loop {
            let report = self.tick().await;
            log::trace!(
                "telemetry tick: {} in {:?}, {} alert(s)",
                report.source,
                report.elapsed,
                report.alerts
            );
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.period) => {}
            }
        }
        log::info!(
            "telemetry loop stopped after {} log entries",
            self.log.entries_written()
        );
    }
}

/// Slow loop: one fault pass per period.
pub struct FaultLoop {
    reader: FaultReader,
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    period: Duration,
}

impl FaultLoop {
    pub fn new(
        reader: FaultReader,
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> Self {
        Self {
            reader,
            store,
            clock,
            period,
        }
    }

    /// Run a single iteration. Returns the number of codes published.
    pub async fn tick(&self) -> usize {
        let faults = self.reader.read_faults(self.clock.now()).await;
        let count = faults.len();
        self.store.set_faults(faults);
        count
    }

    /// Tick until `shutdown` is cancelled. The first tick runs immediately.
    pub async fn run(self, shutdown: CancellationToken) {
        log::info!("fault loop started ({}s)", self.period.as_secs());
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                count = self.tick() => log::info!("fault scan: {count} active code(s)"),
            }
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.period) => {}
            }
        }
        log::info!("fault loop stopped");
    }
}
