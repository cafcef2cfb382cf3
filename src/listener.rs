use crate::data::{ActuatorCommand, PerformanceSample, SensorReading};
use crate::resource::ResourceName;
use async_trait::async_trait;

/// Consumer of everything the device's subsystems produce.
///
/// Producers (sensor timer, performance timer, inbound delivery) hold an
/// `Arc<dyn DataMessageListener>` handed to them when they are started, so
/// every method may be called concurrently from several tasks. Implementors
/// never fail: invalid input and collaborator errors are logged and turned
/// into `false` / `None`.
#[async_trait]
pub trait DataMessageListener: Send + Sync {
    /// Route a directive to its sink. Returns the sink's response, or `None`
    /// when the command was rejected, suppressed or failed.
    async fn on_actuator_command(&self, cmd: ActuatorCommand) -> Option<ActuatorCommand>;

    /// Cache and publish an actuation outcome.
    async fn on_actuator_response(&self, response: ActuatorCommand) -> bool;

    /// Handle a payload delivered by the transport for `resource`.
    async fn on_inbound_message(&self, resource: ResourceName, payload: &str) -> bool;

    async fn on_sensor_reading(&self, reading: SensorReading) -> bool;

    async fn on_performance_sample(&self, sample: PerformanceSample) -> bool;
}
