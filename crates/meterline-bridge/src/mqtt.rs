//! MQTT client wrapper around rumqttc.
//!
//! The `AsyncClient` queues publishes; a spawned background task drives
//! the event loop (network I/O, keepalive, reconnects) and reports
//! connection state through a watch channel. The task never touches
//! bridge state.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use meterline_core::config::MqttConfig;

/// Seconds between reconnect attempts after a broker error.
const RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Fire-and-forget MQTT publisher.
pub struct MqttPublisher {
    client: AsyncClient,
    connected: watch::Receiver<bool>,
    event_loop_task: JoinHandle<()>,
}

impl MqttPublisher {
    /// Create the client and spawn its event-loop task. The connection
    /// is established in the background; use [`Self::wait_connected`]
    /// before publishing anything that must not be dropped.
    pub fn connect(config: &MqttConfig) -> Self {
        let client_id = format!("meterline-{}", config.device_id);
        let mut options = MqttOptions::new(client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(60));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, mut event_loop) = AsyncClient::new(options, 64);
        let (tx, rx) = watch::channel(false);
        let host = config.host.clone();
        let port = config.port;

        let event_loop_task = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker at {host}:{port}");
                        let _ = tx.send(true);
                    }
                    Ok(event) => debug!("MQTT event: {event:?}"),
                    Err(e) => {
                        warn!(
                            "MQTT broker not ready ({e}), retrying in {}s",
                            RECONNECT_DELAY.as_secs()
                        );
                        let _ = tx.send(false);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        Self {
            client,
            connected: rx,
            event_loop_task,
        }
    }

    /// Block until the broker has accepted the connection.
    pub async fn wait_connected(&mut self) {
        while !*self.connected.borrow() {
            if self.connected.changed().await.is_err() {
                return;
            }
        }
    }

    /// Queue one publication. Errors (client queue closed) are logged
    /// and swallowed; delivery is fire-and-forget by design.
    pub async fn publish(&self, topic: &str, payload: &str, retain: bool) {
        if let Err(e) = self
            .client
            .publish(topic, QoS::AtMostOnce, retain, payload)
            .await
        {
            warn!("failed to queue MQTT publish on {topic}: {e}");
        }
    }

    /// Disconnect and stop the event-loop task.
    pub async fn disconnect(self) {
        let _ = self.client.disconnect().await;
        self.event_loop_task.abort();
    }
}
