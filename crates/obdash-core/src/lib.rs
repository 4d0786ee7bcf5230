//! # obdash-core
//!
//! **The engine behind a live vehicle dashboard.**
//!
//! `obdash-core` polls an OBD-II adapter (or simulates one) for nine engine
//! channels, logs every snapshot to hourly newline-delimited JSON files, reads
//! diagnostic trouble codes, and fans state changes out to any number of
//! dashboard subscribers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use obdash_core::{HourlyLog, Sampler, Store, SystemClock, TelemetryLoop};
//!
//! # async fn demo() -> std::io::Result<()> {
//! let store = Arc::new(Store::default());
//! let mut fast = TelemetryLoop::new(
//!     Sampler::new(None, Duration::from_secs(2)),
//!     HourlyLog::create("logs")?,
//!     store.clone(),
//!     Arc::new(SystemClock),
//!     Duration::from_millis(500),
//! );
//! fast.tick().await;
//! println!("rpm = {}", store.snapshot().rpm);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Link → Channel reads → Snapshot → Store → Subscribers
//!                                 ↘ Hourly log
//! ```
//!
//! Every transport implements the [`DiagnosticLink`] trait. Without one, the
//! [`Sampler`] produces bounded random readings so the dashboard always has
//! data. The [`Store`] is the single owner of mutable state; the periodic
//! loops in [`daemon`] and the HTTP layer only touch it through validated
//! methods.

pub mod alert;
pub mod channel;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod elm327;
pub mod event;
pub mod faults;
pub mod link;
pub mod logfile;
pub mod sampler;
pub mod simulate;
pub mod state;
pub mod store;

pub use alert::{Alert, AlertKind, AlertThresholds, AlertValue, evaluate};
pub use channel::{Channel, ChannelReader, STOICHIOMETRIC_AFR, TelemetrySnapshot, round1};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DashboardConfig;
pub use daemon::{FaultLoop, TelemetryLoop, TickReport};
pub use elm327::Elm327Link;
pub use event::{ClientMessage, ControlChange, ControlUpdate, DashboardEvent, RadioChange};
pub use faults::{FaultCode, FaultReader, demo_faults, describe_all, is_valid_dtc};
pub use link::{DiagnosticLink, LinkError, Pid};
pub use logfile::{HourlyLog, LogEntry, Rotation, hour_bucket, log_path};
pub use sampler::{SampleSource, Sampler};
pub use simulate::{simulate_channel, simulate_snapshot, simulated_range};
pub use state::{Control, ControlState, MAX_VOLUME, RadioState, Station};
pub use store::{Store, Subscription, ValidationError};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
