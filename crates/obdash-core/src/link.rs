//! Diagnostic link trait and raw OBD-II parameter ids.
//!
//! Every transport to the vehicle implements the [`DiagnosticLink`] trait,
//! which answers single-PID queries and trouble-code queries. A `None` link
//! anywhere in the crate means "no adapter attached": callers fall back to
//! simulated data.

use thiserror::Error;

/// Raw mode-01 parameter ids backing the dashboard channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pid {
    /// Calculated engine load, percent.
    EngineLoad,
    /// Engine coolant temperature, °C.
    CoolantTemp,
    /// Intake manifold absolute pressure, kPa.
    IntakePressure,
    /// Engine speed, rpm.
    EngineRpm,
    /// Vehicle speed, km/h.
    VehicleSpeed,
    /// Fuel tank level input, percent.
    FuelLevel,
    /// Control module voltage, V.
    ModuleVoltage,
    /// Commanded air-fuel equivalence, reported as an air-fuel ratio.
    AirFuelRatio,
    /// Engine oil temperature, °C.
    OilTemp,
}

impl Pid {
    /// Every PID the dashboard polls, in query order.
    pub const ALL: [Pid; 9] = [
        Pid::EngineRpm,
        Pid::VehicleSpeed,
        Pid::EngineLoad,
        Pid::CoolantTemp,
        Pid::OilTemp,
        Pid::IntakePressure,
        Pid::FuelLevel,
        Pid::ModuleVoltage,
        Pid::AirFuelRatio,
    ];

    /// Mode-01 PID byte.
    pub fn code(self) -> u8 {
        match self {
            Self::EngineLoad => 0x04,
            Self::CoolantTemp => 0x05,
            Self::IntakePressure => 0x0B,
            Self::EngineRpm => 0x0C,
            Self::VehicleSpeed => 0x0D,
            Self::FuelLevel => 0x2F,
            Self::ModuleVoltage => 0x42,
            Self::AirFuelRatio => 0x44,
            Self::OilTemp => 0x5C,
        }
    }

    /// Number of data bytes the ECU returns for this PID.
    pub fn data_len(self) -> usize {
        match self {
            Self::EngineRpm | Self::ModuleVoltage | Self::AirFuelRatio => 2,
            _ => 1,
        }
    }

    /// Decode the data bytes of a mode-01 reply into engineering units.
    ///
    /// Returns `None` if fewer than [`Pid::data_len`] bytes are present.
    pub fn decode(self, data: &[u8]) -> Option<f64> {
        if data.len() < self.data_len() {
            return None;
        }
        let a = f64::from(data[0]);
        let b = data.get(1).copied().map(f64::from).unwrap_or(0.0);
        let value = match self {
            Self::EngineLoad | Self::FuelLevel => a * 100.0 / 255.0,
            Self::CoolantTemp | Self::OilTemp => a - 40.0,
            Self::IntakePressure | Self::VehicleSpeed => a,
            Self::EngineRpm => (256.0 * a + b) / 4.0,
            Self::ModuleVoltage => (256.0 * a + b) / 1000.0,
            // Equivalence ratio λ scaled to gasoline stoichiometry.
            Self::AirFuelRatio => (256.0 * a + b) * 2.0 / 65536.0 * 14.7,
        };
        Some(value)
    }
}

impl std::fmt::Display for Pid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EngineLoad => write!(f, "ENGINE_LOAD"),
            Self::CoolantTemp => write!(f, "COOLANT_TEMP"),
            Self::IntakePressure => write!(f, "INTAKE_PRESSURE"),
            Self::EngineRpm => write!(f, "RPM"),
            Self::VehicleSpeed => write!(f, "SPEED"),
            Self::FuelLevel => write!(f, "FUEL_LEVEL"),
            Self::ModuleVoltage => write!(f, "CONTROL_MODULE_VOLTAGE"),
            Self::AirFuelRatio => write!(f, "AIR_FUEL_RATIO"),
            Self::OilTemp => write!(f, "OIL_TEMP"),
        }
    }
}

/// Transport-level failure talking to the adapter.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("adapter not connected")]
    Disconnected,
    #[error("adapter did not answer within {0:?}")]
    Timeout(std::time::Duration),
    #[error("malformed adapter response: {0}")]
    Protocol(String),
    #[error("query task aborted: {0}")]
    Aborted(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Trait that every diagnostic transport must implement.
///
/// Implementations are called from the blocking thread pool, so plain
/// blocking I/O is fine. `Ok(None)` means the vehicle has no data for the
/// request (unsupported PID, no codes response).
pub trait DiagnosticLink: Send + Sync {
    /// Whether the adapter currently has a live session with the vehicle.
    fn is_connected(&self) -> bool;

    /// Query a single mode-01 PID.
    fn query(&self, pid: Pid) -> Result<Option<f64>, LinkError>;

    /// Query stored trouble codes (mode 03), as raw strings like `"P0300"`.
    fn query_fault_codes(&self) -> Result<Option<Vec<String>>, LinkError>;

    /// Human-readable adapter address, if any.
    fn port(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_codes_are_unique() {
        let mut codes: Vec<u8> = Pid::ALL.iter().map(|p| p.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), Pid::ALL.len());
    }

    #[test]
    fn test_decode_rpm() {
        // 0x1A 0xF8 -> (26*256 + 248) / 4 = 1726
        assert_eq!(Pid::EngineRpm.decode(&[0x1A, 0xF8]), Some(1726.0));
    }

    #[test]
    fn test_decode_coolant_offset() {
        assert_eq!(Pid::CoolantTemp.decode(&[0x8C]), Some(100.0));
    }

    #[test]
    fn test_decode_voltage() {
        // 0x31 0x9C = 12700 mV
        assert_eq!(Pid::ModuleVoltage.decode(&[0x31, 0x9C]), Some(12.7));
    }

    #[test]
    fn test_decode_short_reply() {
        assert_eq!(Pid::EngineRpm.decode(&[0x1A]), None);
        assert_eq!(Pid::VehicleSpeed.decode(&[]), None);
    }

    #[test]
    fn test_pid_display() {
        assert_eq!(Pid::IntakePressure.to_string(), "INTAKE_PRESSURE");
    }
}
