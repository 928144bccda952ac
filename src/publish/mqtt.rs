use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{Client, ClientError, Connection, Event, MqttOptions};
use rumqttc::Outgoing;

use super::tls::{build_transport, MqttEndpoint, TlsMaterials};
use super::Publisher;
use crate::error::PublishError;

pub const DEFAULT_CLIENT_ID: &str = "client_1";
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
const KEEP_ALIVE: Duration = Duration::from_secs(60);
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct MqttSettings {
    pub endpoint: MqttEndpoint,
    pub tls: TlsMaterials,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Requests buffered between the capture loop and the network thread.
    pub queue_capacity: usize,
}

/// Fire-and-forget MQTT publisher.
///
/// Publishes go through rumqttc's bounded request channel and are sent by a
/// background thread that drives the connection. When the channel is full
/// the newest message is dropped so the capture loop never blocks on the
/// broker.
pub struct MqttPublisher {
    client: Client,
    closing: Arc<AtomicBool>,
    connection_handle: Option<JoinHandle<()>>,
    published: u64,
    dropped: u64,
}

impl MqttPublisher {
    pub fn connect(settings: &MqttSettings) -> Result<Self> {
        let endpoint = &settings.endpoint;
        let mut options = MqttOptions::new(&settings.client_id, &endpoint.host, endpoint.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_start(true);
        if let Some(user) = settings.username.as_deref() {
            options.set_credentials(user, settings.password.as_deref().unwrap_or_default());
        }
        options.set_transport(build_transport(endpoint, &settings.tls)?);

        let (client, connection) = Client::new(options, settings.queue_capacity.max(1));
        let closing = Arc::new(AtomicBool::new(false));
        let handle = std::thread::Builder::new()
            .name("mqtt-connection".to_string())
            .spawn({
                let closing = closing.clone();
                move || drive_connection(connection, closing)
            })
            .context("spawn mqtt connection thread")?;

        log::info!(
            "MQTT publisher started for {} (client_id: {}, TLS: {}, auth: {})",
            endpoint,
            settings.client_id,
            endpoint.use_tls,
            settings.username.is_some()
        );
        Ok(Self {
            client,
            closing,
            connection_handle: Some(handle),
            published: 0,
            dropped: 0,
        })
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

fn drive_connection(mut connection: Connection, closing: Arc<AtomicBool>) {
    for event in connection.iter() {
        match event {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(Event::Incoming(_)) | Ok(Event::Outgoing(_)) => {}
            Err(e) => {
                if closing.load(Ordering::SeqCst) {
                    break;
                }
                log::warn!("MQTT connection error: {}", e);
                std::thread::sleep(RECONNECT_PAUSE);
            }
        }
    }
    log::debug!("MQTT connection thread exiting");
}

/// Wait for the connection thread. Returns false if it panicked.
fn join_connection(handle: JoinHandle<()>) -> bool {
    match handle.join() {
        Ok(()) => true,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("unknown cause");
            log::warn!("MQTT connection thread panicked: {}", reason);
            false
        }
    }
}

impl Publisher for MqttPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if self.connection_handle.is_none() {
            return Err(PublishError::Disconnected);
        }
        match self
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
        {
            Ok(()) => {
                self.published += 1;
                Ok(())
            }
            Err(ClientError::TryRequest(_)) => {
                self.dropped += 1;
                Err(PublishError::QueueFull {
                    topic: topic.to_string(),
                })
            }
            Err(e) => Err(PublishError::Client(e.to_string())),
        }
    }

    fn disconnect(&mut self) -> Result<(), PublishError> {
        let Some(handle) = self.connection_handle.take() else {
            return Err(PublishError::Disconnected);
        };
        self.closing.store(true, Ordering::SeqCst);
        let result = self
            .client
            .disconnect()
            .map_err(|e| PublishError::Client(e.to_string()));
        join_connection(handle);
        log::info!(
            "MQTT publisher disconnected ({} published, {} dropped)",
            self.published,
            self.dropped
        );
        result
    }
}
