//! ELM327 adapter reached over TCP (the usual WiFi OBD-II dongles).
//!
//! Commands are ASCII terminated by `\r`; the adapter answers with one or
//! more lines and then a `>` prompt. The session is initialised with echo,
//! spaces and linefeeds off so replies parse as compact hex.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::link::{DiagnosticLink, LinkError, Pid};

/// Commands sent once after connecting.
const INIT_COMMANDS: [&str; 5] = ["ATZ", "ATE0", "ATS0", "ATL0", "ATSP0"];

/// Upper bound for the first vehicle query, which triggers the adapter's
/// protocol search. Slow K-line buses can take several seconds.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Replies that mean "nothing to report" rather than a failure.
const NO_DATA_MARKERS: [&str; 4] = ["NO DATA", "UNABLE TO CONNECT", "STOPPED", "CAN ERROR"];

/// A blocking ELM327 session.
pub struct Elm327Link {
    addr: String,
    timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
    connected: AtomicBool,
}

impl Elm327Link {
    /// Connect to `addr` (`host:port`) and initialise the adapter.
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self, LinkError> {
        log::info!("connecting to ELM327 at {addr}");
        let target = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| LinkError::Protocol(format!("cannot resolve {addr}")))?;
        let stream = TcpStream::connect_timeout(&target, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        let link = Self {
            addr: addr.to_string(),
            timeout,
            stream: Mutex::new(Some(stream)),
            connected: AtomicBool::new(true),
        };
        for cmd in INIT_COMMANDS {
            let reply = link.execute(cmd)?;
            log::debug!("{cmd} -> {reply:?}");
        }
        // Settle the protocol search now rather than during the first
        // sampling pass. "UNABLE TO CONNECT" here is not fatal.
        let reply = link.execute_with("0100", timeout.max(SEARCH_TIMEOUT))?;
        log::debug!("0100 -> {reply:?}");
        log::info!("ELM327 at {addr} initialised");
        Ok(link)
    }

    /// Send one command and return the reply without the prompt.
    ///
    /// Any transport failure ends the session: the link reports disconnected
    /// from then on.
    fn execute(&self, command: &str) -> Result<String, LinkError> {
        self.execute_with(command, self.timeout)
    }

    fn execute_with(&self, command: &str, timeout: Duration) -> Result<String, LinkError> {
        let mut guard = self.stream.lock();
        let stream = guard.as_mut().ok_or(LinkError::Disconnected)?;
        let result = if timeout == self.timeout {
            exchange(stream, command, timeout)
        } else {
            exchange_extended(stream, command, timeout, self.timeout)
        };
        match result {
            Ok(reply) => Ok(reply),
            Err(e) => {
                log::warn!("ELM327 at {} dropped: {e}", self.addr);
                *guard = None;
                self.connected.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

impl DiagnosticLink for Elm327Link {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn query(&self, pid: Pid) -> Result<Option<f64>, LinkError> {
        let reply = self.execute(&format!("01{:02X}", pid.code()))?;
        parse_mode01(pid, &reply)
    }

    fn query_fault_codes(&self) -> Result<Option<Vec<String>>, LinkError> {
        let reply = self.execute("03")?;
        parse_mode03(&reply)
    }

    fn port(&self) -> Option<String> {
        Some(self.addr.clone())
    }
}

fn exchange(stream: &mut TcpStream, command: &str, timeout: Duration) -> Result<String, LinkError> {
    stream.write_all(command.as_bytes())?;
    stream.write_all(b"\r")?;

    let mut buf = [0u8; 128];
    let mut reply = Vec::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout {
            return Err(LinkError::Timeout(timeout));
        }
        match stream.read(&mut buf) {
            Ok(0) => return Err(LinkError::Disconnected),
            Ok(n) => {
                reply.extend_from_slice(&buf[..n]);
                if reply.contains(&b'>') {
                    break;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Err(LinkError::Timeout(timeout));
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }

    let text = String::from_utf8_lossy(&reply);
    Ok(text.split('>').next().unwrap_or_default().to_string())
}

/// One exchange under a longer read timeout, restoring `normal` afterwards.
fn exchange_extended(
    stream: &mut TcpStream,
    command: &str,
    timeout: Duration,
    normal: Duration,
) -> Result<String, LinkError> {
    stream.set_read_timeout(Some(timeout))?;
    let reply = exchange(stream, command, timeout)?;
    stream.set_read_timeout(Some(normal))?;
    Ok(reply)
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

/// Non-empty reply lines with spaces and status chatter removed.
fn reply_lines(reply: &str) -> Vec<String> {
    reply
        .split(['\r', '\n'])
        .map(|l| l.trim().replace(' ', ""))
        .filter(|l| !l.is_empty() && !l.starts_with("SEARCHING"))
        .collect()
}

fn is_no_data(lines: &[String]) -> bool {
    lines.is_empty()
        || lines
            .iter()
            .any(|l| l == "?" || NO_DATA_MARKERS.iter().any(|m| l.contains(&m.replace(' ', ""))))
}

fn hex_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Parse a mode-01 reply such as `410C1AF8` into engineering units.
pub fn parse_mode01(pid: Pid, reply: &str) -> Result<Option<f64>, LinkError> {
    let lines = reply_lines(reply);
    if is_no_data(&lines) {
        return Ok(None);
    }
    let header = format!("41{:02X}", pid.code());
    let line = lines
        .iter()
        .find(|l| l.starts_with(&header))
        .ok_or_else(|| LinkError::Protocol(format!("no {header} frame in {reply:?}")))?;
    let data = hex_bytes(&line[header.len()..])
        .ok_or_else(|| LinkError::Protocol(format!("bad hex in {line:?}")))?;
    pid.decode(&data)
        .map(Some)
        .ok_or_else(|| LinkError::Protocol(format!("{pid}: short frame {line:?}")))
}

/// Decode one two-byte trouble code, e.g. `[0x03, 0x00]` → `P0300`.
pub fn decode_dtc(a: u8, b: u8) -> String {
    let system = ['P', 'C', 'B', 'U'][usize::from(a >> 6)];
    format!(
        "{system}{:X}{:X}{:X}{:X}",
        (a >> 4) & 0x3,
        a & 0xF,
        b >> 4,
        b & 0xF
    )
}

/// Parse a mode-03 reply into trouble code strings.
///
/// Legacy buses send `43` plus three code slots per frame; CAN sends `43`,
/// a count byte, then the codes. Longer CAN replies are split into frames
/// prefixed `0:`, `1:`, ... which are joined before decoding. Empty (`0000`)
/// slots are skipped.
pub fn parse_mode03(reply: &str) -> Result<Option<Vec<String>>, LinkError> {
    let lines = reply_lines(reply);
    if is_no_data(&lines) {
        return Ok(None);
    }

    let frames: Vec<&str> = lines
        .iter()
        .filter_map(|l| l.split_once(':').map(|(_, payload)| payload))
        .collect();
    if !frames.is_empty() {
        return parse_multi_frame(&frames.concat()).map(Some);
    }

    let mut codes = Vec::new();
    for line in lines.iter().filter(|l| l.starts_with("43")) {
        let mut data =
            hex_bytes(&line[2..]).ok_or_else(|| LinkError::Protocol(format!("bad hex in {line:?}")))?;
        if data.len() % 2 == 1 {
            data.remove(0);
        }
        codes.extend(
            data.chunks_exact(2)
                .filter(|pair| pair[0] != 0 || pair[1] != 0)
                .map(|pair| decode_dtc(pair[0], pair[1])),
        );
    }
    Ok(Some(codes))
}

/// Decode a reassembled CAN reply: `43`, count, then `count` codes and padding.
fn parse_multi_frame(payload: &str) -> Result<Vec<String>, LinkError> {
    let data = payload
        .strip_prefix("43")
        .and_then(hex_bytes)
        .ok_or_else(|| LinkError::Protocol(format!("bad multi-frame reply {payload:?}")))?;
    let Some((&count, rest)) = data.split_first() else {
        return Ok(Vec::new());
    };
    Ok(rest
        .chunks_exact(2)
        .take(usize::from(count))
        .filter(|pair| pair[0] != 0 || pair[1] != 0)
        .map(|pair| decode_dtc(pair[0], pair[1]))
        .collect())
}
