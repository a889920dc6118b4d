//! Meterline - serial-to-MQTT telemetry bridge.
//!
//! Reads comma-separated sensor records from a serial device and
//! republishes each configured field as an MQTT state topic, announcing
//! the sensors to Home Assistant via MQTT discovery.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use meterline_core::BridgeConfig;

mod bridge;
mod discovery;
mod mqtt;
mod serial;

/// Serial-to-MQTT telemetry bridge with Home Assistant discovery.
#[derive(Parser, Debug)]
#[command(name = "meterline", version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "meterline.toml")]
    config: PathBuf,

    /// Debug-level logging, overriding the configured loglevel.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(loglevel: &str, verbose: bool) {
    let default_directive = if verbose { "debug" } else { loglevel };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Configuration faults are the only fatal ones.
    let config = match BridgeConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config file {}: {e}", args.config.display());
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.loglevel, args.verbose);
    tracing::info!("loaded config from {}", args.config.display());

    match bridge::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("bridge terminated: {e:#}");
            ExitCode::FAILURE
        }
    }
}
