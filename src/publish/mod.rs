//! Outbound event publishing.
//!
//! The capture loop publishes through the `Publisher` trait. `MqttPublisher`
//! talks to a broker; `DryRunPublisher` only logs, for running without one.

mod mqtt;
mod tls;

use crate::error::PublishError;

pub use mqtt::{MqttPublisher, MqttSettings, DEFAULT_CLIENT_ID, DEFAULT_QUEUE_CAPACITY};
pub use tls::{build_transport, parse_mqtt_endpoint, MqttEndpoint, TlsMaterials};

pub trait Publisher {
    /// Queue `payload` for `topic`. Never waits for a broker acknowledgement.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;

    /// Close the connection. A second call reports `Disconnected`.
    fn disconnect(&mut self) -> Result<(), PublishError>;
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        (**self).publish(topic, payload)
    }

    fn disconnect(&mut self) -> Result<(), PublishError> {
        (**self).disconnect()
    }
}

/// Publisher that logs instead of sending.
#[derive(Debug, Default)]
pub struct DryRunPublisher {
    published: u64,
    disconnected: bool,
}

impl DryRunPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

impl Publisher for DryRunPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if self.disconnected {
            return Err(PublishError::Disconnected);
        }
        self.published += 1;
        log::info!(
            "dry-run publish {} {}",
            topic,
            String::from_utf8_lossy(payload)
        );
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), PublishError> {
        if self.disconnected {
            return Err(PublishError::Disconnected);
        }
        self.disconnected = true;
        log::info!("dry-run publisher closed after {} messages", self.published);
        Ok(())
    }
}
