//! One full sampling pass across every dashboard channel.
//!
//! Architecture:
//! 1. If no adapter is attached, or it reports disconnected, draw a
//!    simulated snapshot (this path cannot fail)
//! 2. Otherwise query the channels one after another. The adapter serves a
//!    single request at a time, so each query's timeout only covers its own
//!    round trip
//! 3. A channel that fails falls back on its own; the other channels are
//!    unaffected
//! 4. Assemble all readings into a single [`TelemetrySnapshot`]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::channel::{Channel, ChannelReader, TelemetrySnapshot};
use crate::link::DiagnosticLink;
use crate::simulate::simulate_snapshot;

/// Where a snapshot's readings came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSource {
    /// Read from the vehicle (individual channels may still be fallbacks).
    Diagnostic,
    /// Synthetic values; no usable adapter.
    Simulated,
}

impl std::fmt::Display for SampleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Diagnostic => write!(f, "diagnostic"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// Produces telemetry snapshots from an optional diagnostic link.
pub struct Sampler {
    reader: Option<ChannelReader>,
    rng: Mutex<StdRng>,
}

impl Sampler {
    /// Create a sampler. `None` means simulation only.
    pub fn new(link: Option<Arc<dyn DiagnosticLink>>, query_timeout: Duration) -> Self {
        Self {
            reader: link.map(|l| ChannelReader::new(l, query_timeout)),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Simulation-only sampler with a fixed seed.
    pub fn simulated(seed: u64) -> Self {
        Self {
            reader: None,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// The attached link, if any.
    pub fn link(&self) -> Option<&Arc<dyn DiagnosticLink>> {
        self.reader.as_ref().map(ChannelReader::link)
    }

    /// Whether the next pass will read from the vehicle.
    pub fn is_live(&self) -> bool {
        self.link().is_some_and(|l| l.is_connected())
    }

    /// Run one sampling pass.
    pub async fn sample(&self) -> (TelemetrySnapshot, SampleSource) {
        let reader = match &self.reader {
            Some(reader) if reader.link().is_connected() => reader,
            _ => {
                let snapshot = simulate_snapshot(&mut *self.rng.lock());
                return (snapshot, SampleSource::Simulated);
            }
        };

        let mut snapshot = TelemetrySnapshot::fallback();
        for channel in Channel::ALL {
            snapshot.set(channel, reader.read(channel).await);
        }
        (snapshot, SampleSource::Diagnostic)
    }
}
