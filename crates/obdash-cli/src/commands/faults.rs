use std::time::Duration;

use obdash_core::{Clock, FaultReader, SystemClock};

pub fn run(elm327: Option<&str>, query_timeout: Duration) {
    let link = super::make_link(elm327, query_timeout);
    let simulated = link.is_none();
    let reader = FaultReader::new(link, query_timeout);

    let rt = super::runtime();
    let faults = rt.block_on(reader.read_faults(SystemClock.now()));

    if simulated {
        eprintln!("(no adapter: demo fault codes)");
    }
    match serde_json::to_string_pretty(&faults) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to encode fault list: {e}");
            std::process::exit(1);
        }
    }
}
