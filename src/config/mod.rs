pub mod correction;
pub mod overrides;

pub use correction::ConfigCorrection;

use crate::data::DEFAULT_LOCATION_ID;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Complete device agent configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CdaConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
}

/// Device identity, cadence, enable flags and the local HVAC rule
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_location_id")]
    pub location_id: String,
    /// Sensor and performance tick period. Non-positive values are corrected.
    #[serde(default = "default_poll_cycle_secs")]
    pub poll_cycle_secs: i64,
    #[serde(default = "default_true")]
    pub enable_mqtt_client: bool,
    #[serde(default = "default_true")]
    pub enable_sensing: bool,
    #[serde(default = "default_true")]
    pub enable_actuation: bool,
    #[serde(default = "default_true")]
    pub enable_system_performance: bool,
    #[serde(default = "default_true")]
    pub handle_temp_change_on_device: bool,
    #[serde(default = "default_hvac_floor")]
    pub trigger_hvac_temp_floor: f64,
    #[serde(default = "default_hvac_ceiling")]
    pub trigger_hvac_temp_ceiling: f64,
}

pub(crate) const DEFAULT_POLL_CYCLE_SECS: i64 = 5;
pub(crate) const DEFAULT_HVAC_FLOOR: f64 = 18.0;
pub(crate) const DEFAULT_HVAC_CEILING: f64 = 28.0;
pub(crate) const DEFAULT_QOS: i32 = 1;
pub(crate) const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 5;
pub(crate) const DEFAULT_INBOUND_CAPACITY: usize = 64;

fn default_location_id() -> String {
    DEFAULT_LOCATION_ID.to_string()
}

fn default_poll_cycle_secs() -> i64 {
    DEFAULT_POLL_CYCLE_SECS
}

fn default_true() -> bool {
    true
}

fn default_hvac_floor() -> f64 {
    DEFAULT_HVAC_FLOOR
}

fn default_hvac_ceiling() -> f64 {
    DEFAULT_HVAC_CEILING
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            location_id: default_location_id(),
            poll_cycle_secs: default_poll_cycle_secs(),
            enable_mqtt_client: true,
            enable_sensing: true,
            enable_actuation: true,
            enable_system_performance: true,
            handle_temp_change_on_device: true,
            trigger_hvac_temp_floor: default_hvac_floor(),
            trigger_hvac_temp_ceiling: default_hvac_ceiling(),
        }
    }
}

/// MQTT broker session settings
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// QoS used for publishes and subscriptions (0-2)
    #[serde(default = "default_qos")]
    pub default_qos: i32,
    /// Empty means "use the device location ID"
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Bound on inbound messages waiting for delivery
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_qos() -> i32 {
    DEFAULT_QOS
}

fn default_publish_timeout_secs() -> u64 {
    DEFAULT_PUBLISH_TIMEOUT_SECS
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_inbound_capacity() -> usize {
    DEFAULT_INBOUND_CAPACITY
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            keep_alive_secs: default_keep_alive_secs(),
            default_qos: default_qos(),
            client_id: String::new(),
            publish_timeout_secs: default_publish_timeout_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            inbound_capacity: default_inbound_capacity(),
        }
    }
}

impl MqttConfig {
    /// Client ID to present to the broker. Never blank.
    pub fn effective_client_id(&self, location_id: &str) -> String {
        [self.client_id.trim(), location_id.trim()]
            .into_iter()
            .find(|id| !id.is_empty())
            .unwrap_or(DEFAULT_LOCATION_ID)
            .to_string()
    }
}

/// Simulated sensor set and value ranges
#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    #[serde(default = "default_true")]
    pub enable_temperature: bool,
    #[serde(default = "default_temperature_min")]
    pub temperature_min: f64,
    #[serde(default = "default_temperature_max")]
    pub temperature_max: f64,
    #[serde(default = "default_true")]
    pub enable_pressure: bool,
    #[serde(default = "default_pressure_min")]
    pub pressure_min: f64,
    #[serde(default = "default_pressure_max")]
    pub pressure_max: f64,
    #[serde(default = "default_true")]
    pub enable_humidity: bool,
    #[serde(default = "default_humidity_min")]
    pub humidity_min: f64,
    #[serde(default = "default_humidity_max")]
    pub humidity_max: f64,
}

fn default_temperature_min() -> f64 {
    15.0
}

fn default_temperature_max() -> f64 {
    32.0
}

fn default_pressure_min() -> f64 {
    990.0
}

fn default_pressure_max() -> f64 {
    1030.0
}

fn default_humidity_min() -> f64 {
    30.0
}

fn default_humidity_max() -> f64 {
    60.0
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enable_temperature: true,
            temperature_min: default_temperature_min(),
            temperature_max: default_temperature_max(),
            enable_pressure: true,
            pressure_min: default_pressure_min(),
            pressure_max: default_pressure_max(),
            enable_humidity: true,
            humidity_min: default_humidity_min(),
            humidity_max: default_humidity_max(),
        }
    }
}

/// Errors loading a configuration file
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Read { path: String, reason: String },
    Parse { path: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, reason } => {
                write!(f, "failed to read config '{}': {}", path, reason)
            }
            ConfigError::Parse { path, reason } => {
                write!(f, "invalid config '{}': {}", path, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<CdaConfig, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: display.clone(),
        reason: e.to_string(),
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: display,
        reason: e.to_string(),
    })
}
