use std::sync::Arc;

use obdash_core::{
    DashboardConfig, FaultLoop, FaultReader, HourlyLog, Sampler, Store, SystemClock,
    TelemetryLoop,
};
use obdash_server::AppState;
use tokio_util::sync::CancellationToken;

pub fn run(host: &str, port: u16, elm327: Option<&str>, config: DashboardConfig) {
    let log = HourlyLog::create(&config.log_dir).unwrap_or_else(|e| {
        eprintln!(
            "Cannot create log directory {}: {e}",
            config.log_dir.display()
        );
        std::process::exit(1);
    });

    let link = super::make_link(elm327, config.query_timeout);
    let base = format!("http://{host}:{port}");

    println!("🚗 obdash v{}", obdash_core::VERSION);
    println!("   {base}");
    match link.as_ref().and_then(|l| l.port()) {
        Some(addr) => println!("   ELM327 adapter at {addr}"),
        None => println!("   No adapter: simulated telemetry"),
    }
    println!("   Logs: {}", config.log_dir.display());
    println!(
        "   Sampling every {:?}, fault scan every {:?}",
        config.sample_interval, config.fault_interval
    );
    println!();
    println!("   Endpoints:");
    println!("     GET  /api/sensors           Latest telemetry snapshot");
    println!("     GET  /api/errors            Active fault codes");
    println!("     GET  /api/controls          Cabin controls");
    println!("     POST /api/control/<name>    {{\"state\": true}}");
    println!("     GET  /api/radio             Radio state");
    println!("     POST /api/radio/station     {{\"station\": 2}}");
    println!("     POST /api/radio/play        {{\"playing\": false}}");
    println!("     POST /api/radio/volume      {{\"volume\": 40}}");
    println!("     GET  /api/obd/status        Adapter status");
    println!("     WS   /ws                    Live events");
    println!();
    println!("   Press Ctrl+C to stop.");
    println!();

    let rt = super::runtime();
    rt.block_on(async move {
        let store = Arc::new(Store::new(config.event_capacity));
        let clock = Arc::new(SystemClock);
        let shutdown = CancellationToken::new();

        let fast = TelemetryLoop::new(
            Sampler::new(link.clone(), config.query_timeout),
            log,
            store.clone(),
            clock.clone(),
            config.sample_interval,
        )
        .with_thresholds(config.thresholds);
        let slow = FaultLoop::new(
            FaultReader::new(link.clone(), config.query_timeout),
            store.clone(),
            clock,
            config.fault_interval,
        );
        let fast_task = tokio::spawn(fast.run(shutdown.clone()));
        let slow_task = tokio::spawn(slow.run(shutdown.clone()));

        let on_signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Ctrl+C received, shutting down");
                on_signal.cancel();
            }
        });

        let state = AppState::new(store, link, shutdown.clone());
        let served = obdash_server::run_server(state, host, port).await;
        shutdown.cancel();
        let _ = tokio::join!(fast_task, slow_task);

        if let Err(e) = served {
            eprintln!("Server error on {host}:{port}: {e}");
            std::process::exit(1);
        }
    });
}
