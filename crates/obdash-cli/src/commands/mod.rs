pub mod faults;
pub mod probe;
pub mod sample;
pub mod serve;

use std::sync::Arc;
use std::time::Duration;

use obdash_core::{DiagnosticLink, Elm327Link};

/// Connect to the adapter at `addr`, if one was given.
///
/// A failed connection is reported and the caller continues in simulation
/// mode, the same as running without an adapter.
pub fn make_link(addr: Option<&str>, timeout: Duration) -> Option<Arc<dyn DiagnosticLink>> {
    let addr = addr?;
    match Elm327Link::connect(addr, timeout) {
        Ok(link) => Some(Arc::new(link)),
        Err(e) => {
            eprintln!("Warning: could not connect to ELM327 at {addr}: {e}");
            eprintln!("         continuing with simulated data");
            None
        }
    }
}

/// Create the tokio runtime, exiting if that fails.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to start async runtime: {e}");
        std::process::exit(1);
    })
}

/// Parse a duration like "500ms", "30s", "15m" or "1h". Bare numbers are
/// seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    let (numeric, multiplier) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1000)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60_000)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3_600_000)
    } else {
        (s, 1000)
    };

    let value: u64 = numeric
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {s}"))?;
    if value == 0 {
        return Err(format!("duration must be positive: {s}"));
    }
    Ok(Duration::from_millis(value * multiplier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_suffixes() {
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("15m"), Ok(Duration::from_secs(900)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration(" 2 "), Ok(Duration::from_secs(2)));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("1.5s").is_err());
        assert!(parse_duration("0ms").is_err());
    }

    #[test]
    fn test_no_address_means_simulation() {
        assert!(make_link(None, Duration::from_millis(100)).is_none());
    }
}
