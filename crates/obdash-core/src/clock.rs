//! Wall-clock source for log bucketing and fault timestamps.

use chrono::{Local, NaiveDateTime, TimeDelta};
use parking_lot::Mutex;

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The host's local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually driven clock for deterministic runs.
#[derive(Debug)]
pub struct ManualClock(Mutex<NaiveDateTime>);

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self(Mutex::new(start))
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.0.lock() = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.0.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock()
    }
}
