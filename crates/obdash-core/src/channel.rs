//! Dashboard channels, telemetry snapshots and the per-channel reader.
//!
//! A [`Channel`] is one gauge on the instrument cluster. Each channel is backed
//! by exactly one raw [`Pid`]; the [`ChannelReader`] queries that PID, converts
//! the raw value to dashboard units, and substitutes the channel's fallback
//! when the vehicle has no data, the adapter errors, or the query times out.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::link::{DiagnosticLink, LinkError, Pid};

/// Stoichiometric air-fuel ratio for gasoline, reported when AFR is unknown.
pub const STOICHIOMETRIC_AFR: f64 = 14.7;

/// One telemetry gauge on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    TurboPressure,
    AirFuelRatio,
    Rpm,
    Speed,
    FuelConsumption,
    MotorLoad,
    MotorTemp,
    OilTemp,
    BatteryVoltage,
}

impl Channel {
    /// All channels, in snapshot field order.
    pub const ALL: [Channel; 9] = [
        Channel::TurboPressure,
        Channel::AirFuelRatio,
        Channel::Rpm,
        Channel::Speed,
        Channel::FuelConsumption,
        Channel::MotorLoad,
        Channel::MotorTemp,
        Channel::OilTemp,
        Channel::BatteryVoltage,
    ];

    /// Raw diagnostic command backing this channel.
    pub fn pid(self) -> Pid {
        match self {
            Self::TurboPressure => Pid::IntakePressure,
            Self::AirFuelRatio => Pid::AirFuelRatio,
            Self::Rpm => Pid::EngineRpm,
            Self::Speed => Pid::VehicleSpeed,
            Self::FuelConsumption => Pid::FuelLevel,
            Self::MotorLoad => Pid::EngineLoad,
            Self::MotorTemp => Pid::CoolantTemp,
            Self::OilTemp => Pid::OilTemp,
            Self::BatteryVoltage => Pid::ModuleVoltage,
        }
    }

    /// Whether readings are truncated to whole numbers.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Rpm | Self::Speed | Self::MotorLoad | Self::MotorTemp | Self::OilTemp
        )
    }

    /// Value reported when the channel cannot be read.
    pub fn fallback(self) -> f64 {
        match self {
            Self::AirFuelRatio => STOICHIOMETRIC_AFR,
            _ => 0.0,
        }
    }

    /// Convert a raw PID value into dashboard units.
    pub fn convert(self, raw: f64) -> f64 {
        match self {
            // kPa -> bar
            Self::TurboPressure => round1(raw / 100.0),
            // Rough L/100km estimate from tank level; an empty or unknown tank reads 0.
            Self::FuelConsumption => {
                if raw > 0.0 {
                    round1(10.0 - raw / 10.0)
                } else {
                    0.0
                }
            }
            Self::AirFuelRatio | Self::BatteryVoltage => round1(raw),
            Self::Rpm | Self::Speed | Self::MotorLoad | Self::MotorTemp | Self::OilTemp => {
                raw.trunc()
            }
        }
    }

    /// Snapshot key, e.g. `"motor_temp"`.
    pub fn id(self) -> &'static str {
        match self {
            Self::TurboPressure => "turbo_pressure",
            Self::AirFuelRatio => "air_fuel_ratio",
            Self::Rpm => "rpm",
            Self::Speed => "speed",
            Self::FuelConsumption => "fuel_consumption",
            Self::MotorLoad => "motor_load",
            Self::MotorTemp => "motor_temp",
            Self::OilTemp => "oil_temp",
            Self::BatteryVoltage => "battery_voltage",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One complete set of channel readings.
///
/// Every channel is always present; a snapshot is never partially filled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub turbo_pressure: f64,
    pub air_fuel_ratio: f64,
    pub rpm: i32,
    pub speed: i32,
    pub fuel_consumption: f64,
    pub motor_load: i32,
    pub motor_temp: i32,
    pub oil_temp: i32,
    pub battery_voltage: f64,
}

impl TelemetrySnapshot {
    /// Snapshot with every channel at its fallback value.
    pub fn fallback() -> Self {
        Self::from_fn(Channel::fallback)
    }

    /// Build a snapshot by evaluating `f` once per channel.
    pub fn from_fn(mut f: impl FnMut(Channel) -> f64) -> Self {
        let mut snapshot = Self {
            turbo_pressure: 0.0,
            air_fuel_ratio: 0.0,
            rpm: 0,
            speed: 0,
            fuel_consumption: 0.0,
            motor_load: 0,
            motor_temp: 0,
            oil_temp: 0,
            battery_voltage: 0.0,
        };
        for channel in Channel::ALL {
            snapshot.set(channel, f(channel));
        }
        snapshot
    }

    /// Reading for a channel.
    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::TurboPressure => self.turbo_pressure,
            Channel::AirFuelRatio => self.air_fuel_ratio,
            Channel::Rpm => f64::from(self.rpm),
            Channel::Speed => f64::from(self.speed),
            Channel::FuelConsumption => self.fuel_consumption,
            Channel::MotorLoad => f64::from(self.motor_load),
            Channel::MotorTemp => f64::from(self.motor_temp),
            Channel::OilTemp => f64::from(self.oil_temp),
            Channel::BatteryVoltage => self.battery_voltage,
        }
    }

    /// Set a channel; integer channels are truncated.
    pub fn set(&mut self, channel: Channel, value: f64) {
        let int = value.trunc() as i32;
        match channel {
            Channel::TurboPressure => self.turbo_pressure = value,
            Channel::AirFuelRatio => self.air_fuel_ratio = value,
            Channel::Rpm => self.rpm = int,
            Channel::Speed => self.speed = int,
            Channel::FuelConsumption => self.fuel_consumption = value,
            Channel::MotorLoad => self.motor_load = int,
            Channel::MotorTemp => self.motor_temp = int,
            Channel::OilTemp => self.oil_temp = int,
            Channel::BatteryVoltage => self.battery_voltage = value,
        }
    }
}

impl Default for TelemetrySnapshot {
    /// Boot values shown before the first sampling pass completes.
    fn default() -> Self {
        let mut snapshot = Self::from_fn(|_| 0.0);
        snapshot.turbo_pressure = 1.2;
        snapshot.air_fuel_ratio = STOICHIOMETRIC_AFR;
        snapshot
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Run a blocking adapter call on the blocking pool, bounded by `timeout`.
///
/// A timeout or a panicking call is reported as an error; the blocking call
/// itself keeps running to completion in the background.
pub(crate) async fn bounded<T, F>(
    link: &Arc<dyn DiagnosticLink>,
    timeout: Duration,
    op: F,
) -> Result<Option<T>, LinkError>
where
    T: Send + 'static,
    F: FnOnce(&dyn DiagnosticLink) -> Result<Option<T>, LinkError> + Send + 'static,
{
    let link = Arc::clone(link);
    let task = tokio::task::spawn_blocking(move || op(link.as_ref()));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(LinkError::Aborted(join.to_string())),
        Err(_) => Err(LinkError::Timeout(timeout)),
    }
}

/// Reads single channels from a diagnostic link with per-channel fallback.
#[derive(Clone)]
pub struct ChannelReader {
    link: Arc<dyn DiagnosticLink>,
    timeout: Duration,
}

impl ChannelReader {
    pub fn new(link: Arc<dyn DiagnosticLink>, timeout: Duration) -> Self {
        Self { link, timeout }
    }

    /// Query the raw PID behind `channel`, without conversion or fallback.
    pub async fn read_raw(&self, channel: Channel) -> Result<Option<f64>, LinkError> {
        let pid = channel.pid();
        bounded(&self.link, self.timeout, move |link| link.query(pid)).await
    }

    /// Read a channel in dashboard units. Never fails.
    pub async fn read(&self, channel: Channel) -> f64 {
        match self.read_raw(channel).await {
            Ok(Some(raw)) if raw.is_finite() => channel.convert(raw),
            Ok(_) => {
                log::debug!("{channel}: no data, using fallback");
                channel.fallback()
            }
            Err(e) => {
                log::debug!("{channel}: {e}, using fallback");
                channel.fallback()
            }
        }
    }

    pub fn link(&self) -> &Arc<dyn DiagnosticLink> {
        &self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // -----------------------------------------------------------------------
    // Mock links
    // -----------------------------------------------------------------------

    /// Answers from a fixed PID table; missing PIDs are "no data".
    struct TableLink(HashMap<Pid, f64>);

    impl DiagnosticLink for TableLink {
        fn is_connected(&self) -> bool {
            true
        }
        fn query(&self, pid: Pid) -> Result<Option<f64>, LinkError> {
            Ok(self.0.get(&pid).copied())
        }
        fn query_fault_codes(&self) -> Result<Option<Vec<String>>, LinkError> {
            Ok(None)
        }
    }

    struct BrokenLink;

    impl DiagnosticLink for BrokenLink {
        fn is_connected(&self) -> bool {
            true
        }
        fn query(&self, _pid: Pid) -> Result<Option<f64>, LinkError> {
            Err(LinkError::Protocol("garbage".into()))
        }
        fn query_fault_codes(&self) -> Result<Option<Vec<String>>, LinkError> {
            Err(LinkError::Disconnected)
        }
    }

    struct SlowLink;

    impl DiagnosticLink for SlowLink {
        fn is_connected(&self) -> bool {
            true
        }
        fn query(&self, _pid: Pid) -> Result<Option<f64>, LinkError> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(Some(90.0))
        }
        fn query_fault_codes(&self) -> Result<Option<Vec<String>>, LinkError> {
            Ok(None)
        }
    }

    fn reader(link: impl DiagnosticLink + 'static) -> ChannelReader {
        ChannelReader::new(Arc::new(link), Duration::from_millis(50))
    }

    // -----------------------------------------------------------------------
    // Conversion tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_intake_pressure_to_bar() {
        assert_eq!(Channel::TurboPressure.convert(202.0), 2.0);
        assert_eq!(Channel::TurboPressure.convert(134.0), 1.3);
    }

    #[test]
    fn test_fuel_level_to_consumption() {
        assert_eq!(Channel::FuelConsumption.convert(55.0), 4.5);
        assert_eq!(Channel::FuelConsumption.convert(0.0), 0.0);
    }

    #[test]
    fn test_integer_channels_truncate() {
        assert_eq!(Channel::Rpm.convert(1726.75), 1726.0);
        assert_eq!(Channel::MotorLoad.convert(49.8), 49.0);
    }

    #[test]
    fn test_float_channels_round() {
        assert_eq!(Channel::BatteryVoltage.convert(12.66), 12.7);
        assert_eq!(Channel::AirFuelRatio.convert(14.64), 14.6);
    }

    #[test]
    fn test_fallbacks() {
        for channel in Channel::ALL {
            let expected = if channel == Channel::AirFuelRatio { 14.7 } else { 0.0 };
            assert_eq!(channel.fallback(), expected, "{channel}");
        }
    }

    // -----------------------------------------------------------------------
    // Snapshot tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_snapshot_serializes_every_channel() {
        let value = serde_json::to_value(TelemetrySnapshot::fallback()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 9);
        for channel in Channel::ALL {
            assert!(obj.contains_key(channel.id()), "missing {channel}");
        }
        assert!(obj["rpm"].is_i64());
        assert_eq!(obj["air_fuel_ratio"], 14.7);
    }

    #[test]
    fn test_snapshot_set_truncates_integers() {
        let mut s = TelemetrySnapshot::fallback();
        s.set(Channel::MotorTemp, 101.9);
        assert_eq!(s.motor_temp, 101);
        assert_eq!(s.get(Channel::MotorTemp), 101.0);
    }

    #[test]
    fn test_snapshot_default_boot_values() {
        let s = TelemetrySnapshot::default();
        assert_eq!(s.turbo_pressure, 1.2);
        assert_eq!(s.air_fuel_ratio, 14.7);
        assert_eq!(s.rpm, 0);
    }

    // -----------------------------------------------------------------------
    // Reader tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_read_converts_units() {
        let r = reader(TableLink(HashMap::from([
            (Pid::IntakePressure, 202.0),
            (Pid::FuelLevel, 55.0),
        ])));
        assert_eq!(r.read(Channel::TurboPressure).await, 2.0);
        assert_eq!(r.read(Channel::FuelConsumption).await, 4.5);
    }

    #[tokio::test]
    async fn test_read_no_data_uses_fallback() {
        let r = reader(TableLink(HashMap::new()));
        assert_eq!(r.read(Channel::AirFuelRatio).await, 14.7);
        assert_eq!(r.read(Channel::Rpm).await, 0.0);
    }

    #[tokio::test]
    async fn test_read_error_uses_fallback() {
        let r = reader(BrokenLink);
        assert_eq!(r.read(Channel::AirFuelRatio).await, 14.7);
        assert_eq!(r.read(Channel::BatteryVoltage).await, 0.0);
    }

    #[tokio::test]
    async fn test_read_timeout_uses_fallback() {
        let r = reader(SlowLink);
        assert!(matches!(
            r.read_raw(Channel::MotorTemp).await,
            Err(LinkError::Timeout(_))
        ));
        assert_eq!(r.read(Channel::MotorTemp).await, 0.0);
    }
}
