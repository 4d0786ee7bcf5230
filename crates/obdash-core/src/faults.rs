//! Diagnostic trouble codes and the fault reader.
//!
//! Each pass produces a complete, freshly timestamped list; nothing is carried
//! over or aged between passes.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::channel::bounded;
use crate::link::DiagnosticLink;

/// Display format of [`FaultCode::time`], as the dashboard renders it.
pub const FAULT_TIME_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Codes reported when no adapter is attached.
const DEMO_CODES: [&str; 4] = ["P0300", "P0171", "P0420", "P0455"];

const UNKNOWN_DESCRIPTION: &str = "Undefined fault code.";

/// Known trouble codes: (code, title, description).
const DTC_TABLE: &[(&str, &str, &str)] = &[
    (
        "P0300",
        "Random/Multiple Cylinder Misfire",
        "A misfire was detected in one or more engine cylinders.",
    ),
    (
        "P0171",
        "System Too Lean (Bank 1)",
        "The fuel system is delivering a mixture that is too lean.",
    ),
    (
        "P0420",
        "Catalyst System Efficiency",
        "Catalytic converter efficiency is below the threshold.",
    ),
    (
        "P0455",
        "Evaporative Emission System Large Leak",
        "A large leak was detected in the fuel vapour emission control system.",
    ),
    (
        "P0101",
        "MAF Sensor Circuit Range/Performance",
        "Range or performance problem in the mass air flow sensor.",
    ),
    (
        "P0135",
        "O2 Sensor Heater Circuit (Bank 1, Sensor 1)",
        "Malfunction in the oxygen sensor heater circuit.",
    ),
    (
        "P0301",
        "Cylinder 1 Misfire",
        "A misfire was detected in cylinder 1.",
    ),
    (
        "P0442",
        "Evaporative Emission System Small Leak",
        "A small leak was detected in the fuel vapour emission control system.",
    ),
    ("P0500", "Vehicle Speed Sensor", "Malfunction in the vehicle speed sensor."),
];

/// One active trouble code as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultCode {
    pub code: String,
    pub title: String,
    pub description: String,
    /// When this pass observed the code, in [`FAULT_TIME_FORMAT`].
    pub time: String,
}

impl FaultCode {
    /// Describe `code` from the lookup table, or generically if unknown.
    pub fn describe(code: &str, observed_at: NaiveDateTime) -> Self {
        let (title, description) = DTC_TABLE
            .iter()
            .find(|(c, _, _)| *c == code)
            .map(|(_, t, d)| ((*t).to_string(), (*d).to_string()))
            .unwrap_or_else(|| (format!("Code {code}"), UNKNOWN_DESCRIPTION.to_string()));
        Self {
            code: code.to_string(),
            title,
            description,
            time: observed_at.format(FAULT_TIME_FORMAT).to_string(),
        }
    }
}

/// Whether `code` looks like an OBD-II DTC: one of `PCBU` and four hex digits.
pub fn is_valid_dtc(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 5
        && matches!(bytes[0], b'P' | b'C' | b'B' | b'U')
        && bytes[1..]
            .iter()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(b))
}

/// Canned codes shown in simulation mode.
pub fn demo_faults(now: NaiveDateTime) -> Vec<FaultCode> {
    DEMO_CODES
        .iter()
        .map(|code| FaultCode::describe(code, now))
        .collect()
}

/// Map raw adapter codes to dashboard entries, dropping malformed ones.
pub fn describe_all(raw: &[String], now: NaiveDateTime) -> Vec<FaultCode> {
    raw.iter()
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| {
            let ok = is_valid_dtc(c);
            if !ok {
                log::warn!("ignoring malformed trouble code {c:?}");
            }
            ok
        })
        .map(|c| FaultCode::describe(&c, now))
        .collect()
}

/// Reads the active trouble codes from an optional diagnostic link.
pub struct FaultReader {
    link: Option<Arc<dyn DiagnosticLink>>,
    timeout: Duration,
}

impl FaultReader {
    pub fn new(link: Option<Arc<dyn DiagnosticLink>>, timeout: Duration) -> Self {
        Self { link, timeout }
    }

    /// Read the current fault list, stamped with `now`.
    ///
    /// Without a connected adapter this is the demo set. With one, a failed or
    /// empty query yields an empty list.
    pub async fn read_faults(&self, now: NaiveDateTime) -> Vec<FaultCode> {
        let link = match &self.link {
            Some(link) if link.is_connected() => link,
            _ => return demo_faults(now),
        };

        match bounded(link, self.timeout, |l| l.query_fault_codes()).await {
            Ok(Some(raw)) => describe_all(&raw, now),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("trouble code query failed: {e}");
                Vec::new()
            }
        }
    }
}
