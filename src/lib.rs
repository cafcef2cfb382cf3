// Wire records and their JSON codec
pub mod data;

// Logical resource <-> topic table
pub mod resource;

// Listener contract shared by all producers
pub mod listener;

// Fixed-interval background tasks
pub mod scheduler;

// Telemetry sources and the sensor poller
pub mod sensor;

// Actuation sinks and command routing
pub mod actuator;

// Host CPU/memory sampling
pub mod system;

// Pub/sub session (MQTT)
pub mod transport;

// Device orchestrator and local HVAC rule
pub mod device;

// Configuration loading, overrides and corrections
pub mod config;

pub use config::{load_config, CdaConfig};
pub use data::{ActuatorCommand, Command, PerformanceSample, SensorReading};
pub use device::{DeviceDataManager, Subsystems, TransportHandle};
pub use listener::DataMessageListener;
pub use resource::ResourceName;
pub use transport::{InboundMessage, PubSubClient};
