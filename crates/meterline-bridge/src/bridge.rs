//! The bridge loop: read a line, process it, publish the outcome.
//!
//! Single-mutator model: this task exclusively owns the bridge state;
//! the MQTT event loop runs beside it but only moves bytes. Shutdown is
//! cooperative - ctrl-c finishes the in-flight record, persists the
//! cumulative totals and disconnects cleanly.

use std::future;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tokio_serial::SerialStream;
use tracing::{debug, error, info, warn};

use meterline_core::{process_line, BridgeConfig, BridgeState, CumulativeTotals};

use crate::discovery;
use crate::mqtt::MqttPublisher;
use crate::serial;

/// Run the bridge until an interrupt signal arrives.
pub async fn run(config: BridgeConfig) -> Result<()> {
    let mut mqtt = MqttPublisher::connect(&config.mqtt);
    mqtt.wait_connected().await;

    for publication in discovery::discovery_publications(&config) {
        mqtt.publish(&publication.topic, &publication.payload, publication.retain)
            .await;
        info!("published discovery config on {}", publication.topic);
    }

    let totals = CumulativeTotals::load(&config.persistence.totals_path);
    let mut state = BridgeState::new(totals);

    let mut reader = open_reader(&config).await;
    let nodata_timeout = config.serial.data_timeout_secs.map(Duration::from_secs);
    let mut last_data = Instant::now();
    let mut silent = false;

    let mut buf = Vec::new();
    loop {
        // buf is only cleared after a completed read so that a partial
        // line interrupted by the watchdog arm is not thrown away.
        let read = tokio::select! {
            read = reader.read_until(b'\n', &mut buf) => read,
            _ = watchdog(nodata_timeout, last_data), if !silent => {
                silent = true;
                warn!(
                    "received no data for more than {:.1} seconds",
                    last_data.elapsed().as_secs_f64()
                );
                continue;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal, exiting");
                break;
            }
        };

        match read {
            Ok(0) => {
                warn!("serial port closed (EOF) - reopening it and trying again");
                reader = open_reader(&config).await;
                last_data = Instant::now();
                silent = false;
            }
            Ok(_) => {
                if silent {
                    info!(
                        "receiving data again after {:.1} seconds",
                        last_data.elapsed().as_secs_f64()
                    );
                }
                last_data = Instant::now();
                silent = false;

                match std::str::from_utf8(&buf) {
                    Ok(line) => handle_line(&config, &mut state, &mqtt, line).await,
                    Err(e) => error!("error decoding serial data: {e}"),
                }
            }
            Err(e) => {
                warn!("error accessing serial port ({e}) - reopening it and trying again");
                reader = open_reader(&config).await;
                last_data = Instant::now();
                silent = false;
            }
        }
        buf.clear();
    }

    // Safety net: totals are already persisted on every accumulation.
    state.totals.persist();
    mqtt.disconnect().await;
    Ok(())
}

async fn open_reader(config: &BridgeConfig) -> BufReader<SerialStream> {
    BufReader::new(serial::open_with_backoff(&config.serial.port, config.serial.baud_rate).await)
}

/// Resolves when the no-data timeout elapses; pends forever when no
/// timeout is configured.
async fn watchdog(timeout: Option<Duration>, last_data: Instant) {
    match timeout {
        Some(timeout) => tokio::time::sleep_until(last_data + timeout).await,
        None => future::pending().await,
    }
}

async fn handle_line(
    config: &BridgeConfig,
    state: &mut BridgeState,
    mqtt: &MqttPublisher,
    line: &str,
) {
    debug!("received line: {:?}", line.trim_end());
    let outcome = process_line(config, state, line, Local::now());
    for publication in &outcome.publications {
        mqtt.publish(&publication.topic, &publication.payload, publication.retain)
            .await;
    }
}
