//! Publish/subscribe session used to talk to the upstream gateway.

pub mod mqtt;

#[cfg(test)]
mod tests;

pub use mqtt::MqttConnector;

use crate::resource::ResourceName;
use async_trait::async_trait;
use tracing::warn;

/// A message received on a subscribed resource.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundMessage {
    pub resource: ResourceName,
    pub payload: String,
}

/// Pub/sub session as seen by the device orchestrator.
///
/// Every operation reports success as a bool; failures are logged by the
/// implementation and never returned as errors.
#[async_trait]
pub trait PubSubClient: Send + Sync {
    /// Open the session. False if one is already open or it could not be created.
    async fn connect(&self) -> bool;

    /// Close the session. False if there was none.
    async fn disconnect(&self) -> bool;

    /// Publish `payload` on `resource`. Empty payloads fail fast; QoS
    /// outside 0-2 is replaced by the configured default.
    async fn publish(&self, resource: ResourceName, payload: &str, qos: i32) -> bool;

    async fn subscribe(&self, resource: ResourceName, qos: i32) -> bool;

    async fn unsubscribe(&self, resource: ResourceName) -> bool;

    fn is_connected(&self) -> bool;
}

/// QoS to use for a request: `qos` if valid, otherwise `default_qos`
/// (itself forced into range).
pub fn clamp_qos(qos: i32, default_qos: i32) -> i32 {
    if (0..=2).contains(&qos) {
        return qos;
    }

    let fallback = default_qos.clamp(0, 2);
    warn!(
        requested = qos,
        fallback = fallback,
        "QoS out of range, using default"
    );
    fallback
}
