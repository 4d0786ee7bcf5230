//! Shared dashboard state and subscriber fan-out.
//!
//! The [`Store`] owns the latest snapshot, fault list, control state and radio
//! state, each behind its own lock so the telemetry loop never waits on the
//! fault loop or on request handlers. Every accepted mutation publishes an
//! event while the field's write lock is held, so subscribers see updates in
//! the same order they were applied.
//!
//! Fan-out is a bounded `tokio::sync::broadcast` queue. A subscriber that
//! falls behind loses the oldest events instead of stalling the publisher.

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::channel::TelemetrySnapshot;
use crate::event::{ControlChange, ControlUpdate, DashboardEvent, RadioChange};
use crate::faults::FaultCode;
use crate::state::{Control, ControlState, MAX_VOLUME, RadioState};

/// Default per-subscriber queue depth.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Why a control or radio mutation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown control: {0}")]
    UnknownControl(String),
    #[error("station index {index} out of range (0..{count})")]
    StationOutOfRange { index: i64, count: usize },
    #[error("volume {0} out of range (0..=100)")]
    VolumeOutOfRange(i64),
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// A new subscriber's catch-up events followed by its live feed.
pub struct Subscription {
    /// Current state, one event per category, to deliver before any live event.
    pub replay: Vec<DashboardEvent>,
    pub receiver: broadcast::Receiver<DashboardEvent>,
}

/// Thread-safe owner of all mutable dashboard state.
pub struct Store {
    snapshot: RwLock<TelemetrySnapshot>,
    faults: RwLock<Vec<FaultCode>>,
    controls: RwLock<ControlState>,
    radio: RwLock<RadioState>,
    events: broadcast::Sender<DashboardEvent>,
}

impl Store {
    /// Create a store with boot defaults and a fan-out queue of `capacity`
    /// events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            snapshot: RwLock::new(TelemetrySnapshot::default()),
            faults: RwLock::new(Vec::new()),
            controls: RwLock::new(ControlState::default()),
            radio: RwLock::new(RadioState::default()),
            events,
        }
    }

    // -- reads ---------------------------------------------------------------

    pub fn snapshot(&self) -> TelemetrySnapshot {
        *self.snapshot.read()
    }

    pub fn faults(&self) -> Vec<FaultCode> {
        self.faults.read().clone()
    }

    pub fn controls(&self) -> ControlState {
        *self.controls.read()
    }

    pub fn radio(&self) -> RadioState {
        self.radio.read().clone()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    // -- loop-side writes ----------------------------------------------------

    /// Replace the snapshot. Publishing `sensor_update` is left to the caller
    /// so the log write can happen in between.
    pub fn update_snapshot(&self, snapshot: TelemetrySnapshot) {
        *self.snapshot.write() = snapshot;
    }

    /// Replace the fault list and publish `error_update`.
    pub fn set_faults(&self, faults: Vec<FaultCode>) {
        let mut guard = self.faults.write();
        *guard = faults;
        self.publish(DashboardEvent::ErrorUpdate(guard.clone()));
    }

    /// Send `event` to every subscriber. Returns how many received it; zero
    /// subscribers is not an error.
    pub fn publish(&self, event: DashboardEvent) -> usize {
        log::trace!("publish {}", event.name());
        self.events.send(event).unwrap_or(0)
    }

    // -- validated mutations -------------------------------------------------

    pub fn set_control(&self, control: Control, on: bool) {
        let mut guard = self.controls.write();
        guard.set(control, on);
        self.publish(DashboardEvent::ControlUpdate(ControlUpdate {
            control,
            state: on,
        }));
    }

    /// Set a control by its wire id.
    pub fn set_control_by_id(&self, id: &str, on: bool) -> Result<Control, ValidationError> {
        let control: Control = id
            .parse()
            .map_err(|()| ValidationError::UnknownControl(id.to_string()))?;
        self.set_control(control, on);
        Ok(control)
    }

    pub fn set_station(&self, index: i64) -> Result<(), ValidationError> {
        let mut guard = self.radio.write();
        guard.current_station = check_station(index, guard.stations.len())?;
        self.publish(DashboardEvent::RadioUpdate(guard.clone()));
        Ok(())
    }

    pub fn set_playing(&self, playing: bool) {
        let mut guard = self.radio.write();
        guard.is_playing = playing;
        self.publish(DashboardEvent::RadioUpdate(guard.clone()));
    }

    pub fn set_volume(&self, volume: i64) -> Result<(), ValidationError> {
        let mut guard = self.radio.write();
        guard.volume = check_volume(volume)?;
        self.publish(DashboardEvent::RadioUpdate(guard.clone()));
        Ok(())
    }

    /// Apply a subscriber's `control_change` message.
    pub fn apply_control_change(&self, change: &ControlChange) -> Result<Control, ValidationError> {
        let id = change
            .control
            .as_deref()
            .ok_or(ValidationError::MissingField("control"))?;
        let state = change.state.ok_or(ValidationError::MissingField("state"))?;
        self.set_control_by_id(id, state)
    }

    /// Apply a subscriber's `radio_change` message.
    ///
    /// Each present field goes through the same setter as its HTTP route and
    /// publishes its own `radio_update`. An invalid field is logged and
    /// skipped without blocking the others. Returns how many fields were
    /// applied, or the first rejection if none were.
    pub fn apply_radio_change(&self, change: &RadioChange) -> Result<usize, ValidationError> {
        if change.station.is_none() && change.playing.is_none() && change.volume.is_none() {
            return Err(ValidationError::MissingField("station, playing or volume"));
        }

        let mut applied = 0;
        let mut first_error = None;
        let mut record = |field: &str, result: Result<(), ValidationError>| match result {
            Ok(()) => applied += 1,
            Err(e) => {
                log::warn!("radio_change: skipping {field}: {e}");
                first_error.get_or_insert(e);
            }
        };

        if let Some(index) = change.station {
            record("station", self.set_station(index));
        }
        if let Some(playing) = change.playing {
            self.set_playing(playing);
            record("playing", Ok(()));
        }
        if let Some(volume) = change.volume {
            record("volume", self.set_volume(volume));
        }

        match first_error {
            Some(e) if applied == 0 => Err(e),
            _ => Ok(applied),
        }
    }

    // -- subscribers ---------------------------------------------------------

    /// Register a subscriber.
    ///
    /// The receiver is attached before the replay is built, so nothing
    /// published in between is lost. An update racing the join may show up
    /// both in the replay and on the receiver.
    pub fn subscribe(&self) -> Subscription {
        let receiver = self.events.subscribe();

        let controls = self.controls();
        let mut replay = Vec::with_capacity(3 + Control::ALL.len());
        replay.push(DashboardEvent::SensorUpdate(self.snapshot()));
        replay.push(DashboardEvent::ErrorUpdate(self.faults()));
        replay.extend(Control::ALL.into_iter().map(|control| {
            DashboardEvent::ControlUpdate(ControlUpdate {
                control,
                state: controls.get(control),
            })
        }));
        replay.push(DashboardEvent::RadioUpdate(self.radio()));

        Subscription { replay, receiver }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

fn check_station(index: i64, count: usize) -> Result<usize, ValidationError> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < count)
        .ok_or(ValidationError::StationOutOfRange { index, count })
}

fn check_volume(volume: i64) -> Result<u8, ValidationError> {
    u8::try_from(volume)
        .ok()
        .filter(|v| *v <= MAX_VOLUME)
        .ok_or(ValidationError::VolumeOutOfRange(volume))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn drain(rx: &mut broadcast::Receiver<DashboardEvent>) -> Vec<DashboardEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Validation tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_volume_out_of_range_rejected() {
        let store = Store::default();
        let mut sub = store.subscribe();
        assert_eq!(
            store.set_volume(150),
            Err(ValidationError::VolumeOutOfRange(150))
        );
        assert_eq!(store.set_volume(-1), Err(ValidationError::VolumeOutOfRange(-1)));
        assert_eq!(store.radio().volume, 70);
        assert!(matches!(sub.receiver.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_volume_bounds_accepted() {
        let store = Store::default();
        store.set_volume(0).unwrap();
        assert_eq!(store.radio().volume, 0);
        store.set_volume(100).unwrap();
        assert_eq!(store.radio().volume, 100);
    }

    #[test]
    fn test_station_index_equal_to_len_rejected() {
        let store = Store::default();
        let len = store.radio().stations.len();
        let err = store.set_station(len as i64).unwrap_err();
        assert_eq!(
            err,
            ValidationError::StationOutOfRange {
                index: len as i64,
                count: len
            }
        );
        assert_eq!(store.radio().current_station, 0);
        store.set_station(len as i64 - 1).unwrap();
        assert_eq!(store.radio().current_station, len - 1);
    }

    #[test]
    fn test_unknown_control_rejected() {
        let store = Store::default();
        let before = store.controls();
        assert_eq!(
            store.set_control_by_id("warp_drive", true),
            Err(ValidationError::UnknownControl("warp_drive".into()))
        );
        assert_eq!(store.controls(), before);
    }

    #[test]
    fn test_control_change_missing_state() {
        let store = Store::default();
        let change = ControlChange {
            control: Some("light".into()),
            state: None,
        };
        assert_eq!(
            store.apply_control_change(&change),
            Err(ValidationError::MissingField("state"))
        );
        assert!(store.controls().light);
    }

    // -----------------------------------------------------------------------
    // Radio change tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_radio_change_skips_invalid_field() {
        let store = Store::default();
        let mut sub = store.subscribe();
        let change = RadioChange {
            station: Some(9),
            playing: None,
            volume: Some(40),
        };
        assert_eq!(store.apply_radio_change(&change), Ok(1));

        let radio = store.radio();
        assert_eq!(radio.current_station, 0);
        assert_eq!(radio.volume, 40);
        assert_eq!(
            drain(&mut sub.receiver),
            vec![DashboardEvent::RadioUpdate(radio)]
        );
    }

    #[test]
    fn test_radio_change_all_fields_invalid() {
        let store = Store::default();
        let change = RadioChange {
            station: Some(-1),
            playing: None,
            volume: Some(101),
        };
        assert_eq!(
            store.apply_radio_change(&change),
            Err(ValidationError::StationOutOfRange { index: -1, count: 5 })
        );
        assert_eq!(store.radio(), RadioState::default());
    }

    #[test]
    fn test_radio_change_publishes_per_field() {
        let store = Store::default();
        let mut sub = store.subscribe();
        let change = RadioChange {
            station: Some(3),
            playing: Some(false),
            volume: Some(25),
        };
        assert_eq!(store.apply_radio_change(&change), Ok(3));

        let radio = store.radio();
        assert_eq!(radio.current_station, 3);
        assert!(!radio.is_playing);
        assert_eq!(radio.volume, 25);

        let events = drain(&mut sub.receiver);
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], DashboardEvent::RadioUpdate(radio));
    }

    #[test]
    fn test_empty_radio_change() {
        let store = Store::default();
        assert!(matches!(
            store.apply_radio_change(&RadioChange::default()),
            Err(ValidationError::MissingField(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Fan-out tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_publish_without_subscribers() {
        let store = Store::default();
        assert_eq!(store.subscriber_count(), 0);
        assert_eq!(
            store.publish(DashboardEvent::SensorUpdate(store.snapshot())),
            0
        );
        store.set_control(Control::Spotlight, true);
        assert!(store.controls().spotlight);
    }

    #[test]
    fn test_late_joiner_replay() {
        let store = Store::default();
        store.set_control(Control::SeatHeating, true);
        store.set_volume(30).unwrap();

        let mut sub = store.subscribe();
        let names: Vec<&str> = sub.replay.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            [
                "sensor_update",
                "error_update",
                "control_update",
                "control_update",
                "control_update",
                "control_update",
                "control_update",
                "control_update",
                "radio_update",
            ]
        );
        assert!(sub.replay.contains(&DashboardEvent::ControlUpdate(ControlUpdate {
            control: Control::SeatHeating,
            state: true,
        })));
        match sub.replay.last() {
            Some(DashboardEvent::RadioUpdate(r)) => assert_eq!(r.volume, 30),
            other => panic!("expected radio replay, got {other:?}"),
        }

        // Nothing from before the join leaks onto the live feed.
        assert!(drain(&mut sub.receiver).is_empty());

        store.set_playing(false);
        let live = drain(&mut sub.receiver);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].name(), "radio_update");
    }

    #[test]
    fn test_every_subscriber_gets_each_event() {
        let store = Store::default();
        let mut a = store.subscribe();
        let mut b = store.subscribe();
        assert_eq!(store.publish(DashboardEvent::ErrorUpdate(Vec::new())), 2);
        assert_eq!(drain(&mut a.receiver).len(), 1);
        assert_eq!(drain(&mut b.receiver).len(), 1);
    }

    #[test]
    fn test_slow_subscriber_drops_oldest() {
        let store = Store::new(2);
        let mut sub = store.subscribe();
        for v in [10, 20, 30] {
            store.set_volume(v).unwrap();
        }
        assert!(matches!(
            sub.receiver.try_recv(),
            Err(TryRecvError::Lagged(1))
        ));
        let remaining = drain(&mut sub.receiver);
        assert_eq!(remaining.len(), 2);
        match &remaining[1] {
            DashboardEvent::RadioUpdate(r) => assert_eq!(r.volume, 30),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_set_faults_publishes_full_list() {
        let store = Store::default();
        let mut sub = store.subscribe();
        let now = chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let faults = crate::faults::demo_faults(now);
        store.set_faults(faults.clone());
        assert_eq!(store.faults(), faults);
        assert_eq!(
            drain(&mut sub.receiver),
            vec![DashboardEvent::ErrorUpdate(faults)]
        );
    }
}
