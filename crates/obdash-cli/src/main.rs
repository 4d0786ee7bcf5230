//! CLI for obdash — the vehicle dashboard backend.

mod commands;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use commands::parse_duration;

#[derive(Parser)]
#[command(name = "obdash")]
#[command(about = "obdash — live OBD-II telemetry for an in-car dashboard")]
#[command(version = obdash_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the telemetry and fault loops and serve the dashboard API
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "5000")]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Directory for hourly telemetry logs
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,

        /// ELM327 adapter address (host:port). Simulates data when omitted.
        #[arg(long)]
        elm327: Option<String>,

        /// Delay between telemetry samples (e.g. "500ms", "1s")
        #[arg(long, default_value = "500ms", value_parser = parse_duration)]
        sample_interval: Duration,

        /// Delay between fault-code scans (e.g. "15m", "900s")
        #[arg(long, default_value = "900s", value_parser = parse_duration)]
        fault_interval: Duration,

        /// Timeout for a single adapter query
        #[arg(long, default_value = "2s", value_parser = parse_duration)]
        query_timeout: Duration,

        /// Events buffered per subscriber before the oldest are dropped
        #[arg(long, default_value = "64")]
        event_capacity: usize,

        /// Coolant temperature (°C) above which an alert is raised
        #[arg(long, default_value = "100")]
        max_motor_temp: f64,

        /// Battery voltage below which an alert is raised
        #[arg(long, default_value = "12.0")]
        min_battery: f64,
    },

    /// Take telemetry samples and print them as JSON lines
    Sample {
        /// ELM327 adapter address (host:port). Simulates data when omitted.
        #[arg(long)]
        elm327: Option<String>,

        /// Number of samples
        #[arg(long, default_value = "1")]
        count: usize,

        /// Delay between samples
        #[arg(long, default_value = "500ms", value_parser = parse_duration)]
        interval: Duration,

        /// Timeout for a single adapter query
        #[arg(long, default_value = "2s", value_parser = parse_duration)]
        query_timeout: Duration,
    },

    /// Read active trouble codes and print them as JSON
    Faults {
        /// ELM327 adapter address (host:port). Prints the demo set when omitted.
        #[arg(long)]
        elm327: Option<String>,

        /// Timeout for a single adapter query
        #[arg(long, default_value = "2s", value_parser = parse_duration)]
        query_timeout: Duration,
    },

    /// Query every PID once and show raw and dashboard values
    Probe {
        /// ELM327 adapter address (host:port)
        elm327: String,

        /// Timeout for a single adapter query
        #[arg(long, default_value = "2s", value_parser = parse_duration)]
        query_timeout: Duration,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            log_dir,
            elm327,
            sample_interval,
            fault_interval,
            query_timeout,
            event_capacity,
            max_motor_temp,
            min_battery,
        } => {
            let config = obdash_core::DashboardConfig {
                log_dir,
                sample_interval,
                fault_interval,
                query_timeout,
                event_capacity,
                thresholds: obdash_core::AlertThresholds {
                    motor_temp_max: max_motor_temp,
                    battery_min: min_battery,
                },
            };
            commands::serve::run(&host, port, elm327.as_deref(), config)
        }
        Commands::Sample {
            elm327,
            count,
            interval,
            query_timeout,
        } => commands::sample::run(elm327.as_deref(), count, interval, query_timeout),
        Commands::Faults {
            elm327,
            query_timeout,
        } => commands::faults::run(elm327.as_deref(), query_timeout),
        Commands::Probe {
            elm327,
            query_timeout,
        } => commands::probe::run(&elm327, query_timeout),
    }
}
