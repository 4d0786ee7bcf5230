//! Push events sent to dashboard subscribers and messages they send back.
//!
//! Both directions use the same envelope:
//!
//! ```text
//! {"event": "control_update", "data": {"control": "light", "state": false}}
//! ```

use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::channel::TelemetrySnapshot;
use crate::faults::FaultCode;
use crate::state::{Control, RadioState};

/// A single control's new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlUpdate {
    pub control: Control,
    pub state: bool,
}

/// Server → subscriber events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DashboardEvent {
    SensorUpdate(TelemetrySnapshot),
    ErrorUpdate(Vec<FaultCode>),
    ControlUpdate(ControlUpdate),
    RadioUpdate(RadioState),
    Alert(Alert),
}

impl DashboardEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SensorUpdate(_) => "sensor_update",
            Self::ErrorUpdate(_) => "error_update",
            Self::ControlUpdate(_) => "control_update",
            Self::RadioUpdate(_) => "radio_update",
            Self::Alert(_) => "alert",
        }
    }
}

/// Requested control change. Fields are optional so that missing values can
/// be reported as validation failures rather than parse errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlChange {
    pub control: Option<String>,
    pub state: Option<bool>,
}

/// Requested radio change; any subset of fields may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioChange {
    pub station: Option<i64>,
    pub playing: Option<bool>,
    pub volume: Option<i64>,
}

/// Subscriber → server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    ControlChange(ControlChange),
    RadioChange(RadioChange),
}
