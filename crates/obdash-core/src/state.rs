//! Cabin controls and radio state.

use serde::{Deserialize, Serialize};

/// A switchable cabin control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    Light,
    SeatHeating,
    SeatCooling,
    SteeringHeating,
    Spotlight,
    ScreenSwitch,
}

impl Control {
    pub const ALL: [Control; 6] = [
        Control::Light,
        Control::SeatHeating,
        Control::SeatCooling,
        Control::SteeringHeating,
        Control::Spotlight,
        Control::ScreenSwitch,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::SeatHeating => "seat_heating",
            Self::SeatCooling => "seat_cooling",
            Self::SteeringHeating => "steering_heating",
            Self::Spotlight => "spotlight",
            Self::ScreenSwitch => "screen_switch",
        }
    }
}

impl std::fmt::Display for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for Control {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Control::ALL.into_iter().find(|c| c.id() == s).ok_or(())
    }
}

/// On/off state of every cabin control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub light: bool,
    pub seat_heating: bool,
    pub seat_cooling: bool,
    pub steering_heating: bool,
    pub spotlight: bool,
    pub screen_switch: bool,
}

impl ControlState {
    pub fn get(&self, control: Control) -> bool {
        match control {
            Control::Light => self.light,
            Control::SeatHeating => self.seat_heating,
            Control::SeatCooling => self.seat_cooling,
            Control::SteeringHeating => self.steering_heating,
            Control::Spotlight => self.spotlight,
            Control::ScreenSwitch => self.screen_switch,
        }
    }

    pub fn set(&mut self, control: Control, on: bool) {
        let slot = match control {
            Control::Light => &mut self.light,
            Control::SeatHeating => &mut self.seat_heating,
            Control::SeatCooling => &mut self.seat_cooling,
            Control::SteeringHeating => &mut self.steering_heating,
            Control::Spotlight => &mut self.spotlight,
            Control::ScreenSwitch => &mut self.screen_switch,
        };
        *slot = on;
    }
}

impl Default for ControlState {
    /// Headlights on, everything else off.
    fn default() -> Self {
        Self {
            light: true,
            seat_heating: false,
            seat_cooling: false,
            steering_heating: false,
            spotlight: false,
            screen_switch: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Radio
// ---------------------------------------------------------------------------

/// A preset radio station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    /// Frequency in MHz, as displayed (e.g. `"98.5"`).
    pub freq: String,
}

impl Station {
    pub fn new(name: &str, freq: &str) -> Self {
        Self {
            name: name.to_string(),
            freq: freq.to_string(),
        }
    }
}

/// In-car radio state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioState {
    pub stations: Vec<Station>,
    /// Index into `stations`.
    pub current_station: usize,
    pub is_playing: bool,
    /// 0..=100
    pub volume: u8,
}

/// Highest accepted volume.
pub const MAX_VOLUME: u8 = 100;

impl Default for RadioState {
    fn default() -> Self {
        Self {
            stations: vec![
                Station::new("Power FM 98.5", "98.5"),
                Station::new("Best FM 95.7", "95.7"),
                Station::new("Number 1 FM 92.0", "92.0"),
                Station::new("Radyo D 90.8", "90.8"),
                Station::new("Joy FM 94.3", "94.3"),
            ],
            current_station: 0,
            is_playing: true,
            volume: 70,
        }
    }
}
