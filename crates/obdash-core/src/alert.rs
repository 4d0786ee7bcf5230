//! Threshold alerts raised from each telemetry snapshot.
//!
//! Alerts are level-triggered: every snapshot that violates a threshold raises
//! its alert again, with no debouncing between ticks.

use serde::{Deserialize, Serialize};

use crate::channel::TelemetrySnapshot;

/// Severity of an alert. The dashboard only renders warnings today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Warning,
}

/// The offending reading, serialized in the unit of its channel: coolant
/// temperature is a whole number, voltage a decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlertValue {
    Integer(i32),
    Decimal(f64),
}

impl std::fmt::Display for AlertValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
        }
    }
}

/// A threshold violation pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    pub value: AlertValue,
}

/// Limits that trigger alerts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    /// Coolant temperature above this (°C) is critical.
    pub motor_temp_max: f64,
    /// Battery voltage below this (V) is low.
    pub battery_min: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            motor_temp_max: 100.0,
            battery_min: 12.0,
        }
    }
}

pub const HIGH_TEMP_MESSAGE: &str = "Engine temperature is critical!";
pub const LOW_VOLTAGE_MESSAGE: &str = "Battery voltage is low!";

/// Alerts raised by `snapshot`, in a fixed order (temperature, then voltage).
pub fn evaluate(snapshot: &TelemetrySnapshot, thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let temp = f64::from(snapshot.motor_temp);
    if temp > thresholds.motor_temp_max {
        alerts.push(Alert {
            kind: AlertKind::Warning,
            message: HIGH_TEMP_MESSAGE.to_string(),
            value: AlertValue::Integer(snapshot.motor_temp),
        });
    }
    if snapshot.battery_voltage < thresholds.battery_min {
        alerts.push(Alert {
            kind: AlertKind::Warning,
            message: LOW_VOLTAGE_MESSAGE.to_string(),
            value: AlertValue::Decimal(snapshot.battery_voltage),
        });
    }
    alerts
}
