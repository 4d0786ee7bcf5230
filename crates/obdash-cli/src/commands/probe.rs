use std::sync::Arc;
use std::time::{Duration, Instant};

use obdash_core::{Channel, ChannelReader, DiagnosticLink, Elm327Link};

pub fn run(addr: &str, query_timeout: Duration) {
    let link: Arc<dyn DiagnosticLink> = match Elm327Link::connect(addr, query_timeout) {
        Ok(link) => Arc::new(link),
        Err(e) => {
            eprintln!("Could not connect to ELM327 at {addr}: {e}");
            std::process::exit(1);
        }
    };
    let reader = ChannelReader::new(link.clone(), query_timeout);

    println!("Probing: ELM327 at {addr}");
    println!();
    println!(
        "  {:<18} {:<24} {:>10} {:>10} {:>8}",
        "Channel", "PID", "Raw", "Value", "Time"
    );

    let rt = super::runtime();
    rt.block_on(async {
        for channel in Channel::ALL {
            let pid = channel.pid();
            let t0 = Instant::now();
            let raw = reader.read_raw(channel).await;
            let elapsed = t0.elapsed();
            let (raw_text, value) = match raw {
                Ok(Some(v)) => (format!("{v:.2}"), channel.convert(v)),
                Ok(None) => ("no data".to_string(), channel.fallback()),
                Err(e) => {
                    log::debug!("{pid}: {e}");
                    ("error".to_string(), channel.fallback())
                }
            };
            println!(
                "  {:<18} {:<24} {:>10} {:>10} {:>6}ms",
                channel.id(),
                format!("{pid} (01{:02X})", pid.code()),
                raw_text,
                value,
                elapsed.as_millis()
            );
        }
    });

    println!();
    if !link.is_connected() {
        println!("  Adapter dropped the connection during the probe.");
    }
}
