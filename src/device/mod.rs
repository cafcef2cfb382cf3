//! Device orchestrator: wires sensing, actuation, performance sampling and
//! the pub/sub session together and hosts the local HVAC rule.

pub mod hvac;


pub use hvac::HvacRule;

use crate::actuator::ActuatorManager;
use crate::config::{CdaConfig, DeviceConfig, DEFAULT_QOS};
use crate::data::{from_wire, to_wire, ActuatorCommand, PerformanceSample, SensorReading};
use crate::listener::DataMessageListener;
use crate::resource::ResourceName;
use crate::sensor::SensorManager;
use crate::system::PerformanceManager;
use crate::transport::{InboundMessage, MqttConnector, PubSubClient};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pub/sub client plus the receiving end of its inbound channel.
pub struct TransportHandle {
    pub client: Arc<dyn PubSubClient>,
    pub inbound: mpsc::Receiver<InboundMessage>,
    /// QoS for upstream publishes and the command subscription
    pub qos: i32,
}

impl TransportHandle {
    pub fn new(client: Arc<dyn PubSubClient>, inbound: mpsc::Receiver<InboundMessage>) -> Self {
        Self {
            client,
            inbound,
            qos: DEFAULT_QOS,
        }
    }

    pub fn with_qos(mut self, qos: i32) -> Self {
        self.qos = qos;
        self
    }
}

/// The subsystems a device runs. Absent members are disabled.
#[derive(Default)]
pub struct Subsystems {
    pub sensors: Option<SensorManager>,
    pub actuators: Option<ActuatorManager>,
    pub performance: Option<PerformanceManager>,
    pub transport: Option<TransportHandle>,
}

type Delivery = (CancellationToken, JoinHandle<mpsc::Receiver<InboundMessage>>);

/// Central listener for every subsystem of the device.
///
/// Handler methods run concurrently from the sensor timer, the performance
/// timer and the inbound delivery task. None of them fail: bad input and
/// collaborator errors are logged and reported as `false` / `None`.
pub struct DeviceDataManager {
    location_id: String,
    hvac_rule: Option<HvacRule>,
    sensors: Option<SensorManager>,
    actuators: Option<ActuatorManager>,
    performance: Option<PerformanceManager>,
    transport: Option<Arc<dyn PubSubClient>>,
    qos: i32,
    /// Inbound receiver while no delivery task owns it
    inbound: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
    delivery: Mutex<Option<Delivery>>,
    /// Latest actuator response per actuator type ID
    responses: DashMap<i32, ActuatorCommand>,
    /// Serializes start/stop; true while running
    lifecycle: tokio::sync::Mutex<bool>,
}

impl DeviceDataManager {
    pub fn new(config: &DeviceConfig, subsystems: Subsystems) -> Arc<Self> {
        let Subsystems {
            sensors,
            actuators,
            performance,
            transport,
        } = subsystems;

        let (transport, inbound, qos) = match transport {
            Some(handle) => (Some(handle.client), Some(handle.inbound), handle.qos),
            None => (None, None, DEFAULT_QOS),
        };

        let hvac_rule = HvacRule::from_config(config);
        if hvac_rule.is_some() && actuators.is_none() {
            warn!(
                "On-device temperature handling enabled without actuation, \
                 HVAC commands will be dropped"
            );
        }

        Arc::new(Self {
            location_id: config.location_id.clone(),
            hvac_rule,
            sensors,
            actuators,
            performance,
            transport,
            qos,
            inbound: Mutex::new(inbound),
            delivery: Mutex::new(None),
            responses: DashMap::new(),
            lifecycle: tokio::sync::Mutex::new(false),
        })
    }

    /// Build the device from configuration, honoring the enable flags.
    pub fn from_config(config: &CdaConfig) -> Arc<Self> {
        let device = &config.device;
        let location_id = device.location_id.as_str();

        let sensors = device.enable_sensing.then(|| {
            SensorManager::with_simulated_sources(location_id, device.poll_cycle_secs, &config.sensors)
        });
        let actuators = device
            .enable_actuation
            .then(|| ActuatorManager::with_simulated_sinks(location_id));
        let performance = device
            .enable_system_performance
            .then(|| PerformanceManager::for_host(location_id, device.poll_cycle_secs));
        let transport = device.enable_mqtt_client.then(|| {
            let (tx, rx) = mpsc::channel(config.mqtt.inbound_capacity.max(1));
            let client: Arc<dyn PubSubClient> =
                Arc::new(MqttConnector::new(&config.mqtt, location_id, tx));
            TransportHandle::new(client, rx).with_qos(config.mqtt.default_qos)
        });

        info!(
            location_id = %location_id,
            sensing = sensors.is_some(),
            actuation = actuators.is_some(),
            system_performance = performance.is_some(),
            mqtt = transport.is_some(),
            "Device subsystems configured"
        );

        Self::new(
            device,
            Subsystems {
                sensors,
                actuators,
                performance,
                transport,
            },
        )
    }

    pub fn location_id(&self) -> &str {
        &self.location_id
    }

    pub async fn is_running(&self) -> bool {
        *self.lifecycle.lock().await
    }

    /// Latest actuator response seen for `type_id`.
    pub fn latest_actuator_response(&self, type_id: i32) -> Option<ActuatorCommand> {
        self.responses.get(&type_id).map(|entry| entry.value().clone())
    }

    /// Start timers, inbound delivery and the pub/sub session.
    ///
    /// Returns false if already running.
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut running = self.lifecycle.lock().await;
        if *running {
            info!(location_id = %self.location_id, "Device already running, ignoring start");
            return false;
        }

        info!(location_id = %self.location_id, "Starting device");
        let listener: Arc<dyn DataMessageListener> = self.clone();

        if let Some(sensors) = &self.sensors {
            sensors.start(Arc::clone(&listener));
        }
        if let Some(performance) = &self.performance {
            performance.start(Arc::clone(&listener));
        }

        if let Some(transport) = &self.transport {
            self.start_delivery(Arc::clone(&listener));

            if !transport.connect().await {
                warn!("Pub/sub connect reported no state change");
            }
            if !transport
                .subscribe(ResourceName::ActuatorCommand, self.qos)
                .await
            {
                warn!("Failed to subscribe to actuator commands");
            }
        }

        *running = true;
        info!(location_id = %self.location_id, "Device started");
        true
    }

    /// Tear down in reverse order: the command subscription and session
    /// first, then delivery, then the timers.
    ///
    /// Returns false if not running.
    pub async fn stop(&self) -> bool {
        let mut running = self.lifecycle.lock().await;
        if !*running {
            info!(location_id = %self.location_id, "Device not running, ignoring stop");
            return false;
        }

        info!(location_id = %self.location_id, "Stopping device");

        if let Some(transport) = &self.transport {
            if !transport.unsubscribe(ResourceName::ActuatorCommand).await {
                warn!("Failed to unsubscribe from actuator commands");
            }
            if !transport.disconnect().await {
                warn!("Pub/sub disconnect reported no state change");
            }
            self.stop_delivery().await;
        }

        if let Some(performance) = &self.performance {
            performance.stop().await;
        }
        if let Some(sensors) = &self.sensors {
            sensors.stop().await;
        }

        *running = false;
        info!(location_id = %self.location_id, "Device stopped");
        true
    }

    fn start_delivery(&self, listener: Arc<dyn DataMessageListener>) {
        let inbound = self
            .inbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let Some(mut rx) = inbound else {
            error!("Inbound receiver unavailable, remote commands will not be delivered");
            return;
        };
        discard_queued(&mut rx);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(deliver_inbound(listener, rx, cancel.clone()));

        *self
            .delivery
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some((cancel, handle));
    }

    async fn stop_delivery(&self) {
        let delivery = self
            .delivery
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        let Some((cancel, handle)) = delivery else {
            return;
        };

        cancel.cancel();
        match handle.await {
            Ok(mut rx) => {
                discard_queued(&mut rx);
                *self
                    .inbound
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(rx);
            }
            Err(e) => {
                error!(error = %e, "Inbound delivery task failed");
            }
        }
    }

    async fn publish_response(&self, response: &ActuatorCommand) {
        if !self
            .publish_record(ResourceName::ActuatorResponse, response)
            .await
        {
            debug!(
                type_id = response.type_id(),
                "Actuator response not published upstream"
            );
        }
    }

    async fn publish_record<T: Serialize>(&self, resource: ResourceName, record: &T) -> bool {
        let Some(transport) = &self.transport else {
            debug!(resource = %resource, "No pub/sub client, skipping publish");
            return false;
        };

        let payload = match to_wire(record) {
            Ok(payload) => payload,
            Err(e) => {
                error!(resource = %resource, error = %e, "Failed to encode record");
                return false;
            }
        };

        transport.publish(resource, &payload, self.qos).await
    }
}

#[async_trait]
impl DataMessageListener for DeviceDataManager {
    async fn on_actuator_command(&self, cmd: ActuatorCommand) -> Option<ActuatorCommand> {
        if cmd.location_id().is_empty() {
            warn!(type_id = cmd.type_id(), "Actuator command without location, ignoring");
            return None;
        }

        let Some(actuators) = &self.actuators else {
            debug!(type_id = cmd.type_id(), "Actuation disabled, dropping command");
            return None;
        };

        // Cache under the slot lock so concurrent commands for one actuator
        // leave the response of the last applied command behind
        let response = actuators.dispatch_and_record(&cmd, |response| {
            self.responses.insert(response.type_id(), response.clone());
        })?;
        self.publish_response(&response).await;
        Some(response)
    }

    async fn on_actuator_response(&self, response: ActuatorCommand) -> bool {
        if response.location_id().is_empty() || !response.is_response() {
            warn!(
                type_id = response.type_id(),
                "Invalid actuator response, ignoring"
            );
            return false;
        }

        self.responses.insert(response.type_id(), response.clone());
        self.publish_response(&response).await;
        true
    }

    async fn on_inbound_message(&self, resource: ResourceName, payload: &str) -> bool {
        match resource {
            ResourceName::ActuatorCommand => match from_wire::<ActuatorCommand>(payload) {
                Ok(cmd) => {
                    debug!(
                        type_id = cmd.type_id(),
                        command = %cmd.command,
                        "Remote actuator command received"
                    );
                    self.on_actuator_command(cmd).await;
                    true
                }
                Err(e) => {
                    warn!(resource = %resource, error = %e, "Undecodable actuator command");
                    false
                }
            },
            other => {
                debug!(resource = %other, "No handler for inbound resource");
                false
            }
        }
    }

    async fn on_sensor_reading(&self, reading: SensorReading) -> bool {
        if reading.location_id().is_empty() {
            warn!(type_id = reading.type_id(), "Sensor reading without location, ignoring");
            return false;
        }

        if let Some(cmd) = self.hvac_rule.as_ref().and_then(|rule| rule.evaluate(&reading)) {
            self.on_actuator_command(cmd.with_location(self.location_id.clone()))
                .await;
        }

        self.publish_record(ResourceName::SensorData, &reading).await;
        true
    }

    async fn on_performance_sample(&self, sample: PerformanceSample) -> bool {
        if sample.location_id().is_empty() {
            warn!("Performance sample without location, ignoring");
            return false;
        }

        self.publish_record(ResourceName::SystemPerformance, &sample)
            .await;
        true
    }
}

/// Drain inbound messages into the listener until cancelled. The receiver is
/// handed back so delivery can resume after a restart.
async fn deliver_inbound(
    listener: Arc<dyn DataMessageListener>,
    mut rx: mpsc::Receiver<InboundMessage>,
    cancel: CancellationToken,
) -> mpsc::Receiver<InboundMessage> {
    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = rx.recv() => message,
        };

        let Some(InboundMessage { resource, payload }) = message else {
            debug!("Inbound channel closed");
            break;
        };

        listener.on_inbound_message(resource, &payload).await;
    }

    rx
}

/// Drop messages left in the inbound queue. Commands queued while delivery
/// was stopped are stale and must not be applied on the next start.
fn discard_queued(rx: &mut mpsc::Receiver<InboundMessage>) {
    let mut dropped = 0usize;
    while let Ok(message) = rx.try_recv() {
        debug!(resource = %message.resource, "Dropping queued inbound message");
        dropped += 1;
    }
    if dropped > 0 {
        info!(dropped = dropped, "Discarded inbound messages queued while stopped");
    }
}
