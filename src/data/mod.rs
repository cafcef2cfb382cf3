use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

mod codec;

pub use codec::{from_wire, to_wire, CodecError};

pub const DEFAULT_LOCATION_ID: &str = "constraineddevice001";
pub const NOT_SET: &str = "Not Set";

/// Sensor type IDs
pub const TEMP_SENSOR_TYPE: i32 = 1;
pub const PRESSURE_SENSOR_TYPE: i32 = 2;
pub const HUMIDITY_SENSOR_TYPE: i32 = 3;

/// Actuator type IDs
pub const HVAC_ACTUATOR_TYPE: i32 = 1;
pub const HUMIDIFIER_ACTUATOR_TYPE: i32 = 2;
pub const LED_DISPLAY_ACTUATOR_TYPE: i32 = 100;

/// System performance type IDs
pub const SYSTEM_PERF_TYPE: i32 = 9000;
pub const CPU_UTIL_TYPE: i32 = 9001;
pub const MEM_UTIL_TYPE: i32 = 9002;

/// Status codes reported by actuation sinks
pub const STATUS_OK: i32 = 0;
pub const STATUS_ERROR: i32 = 1;
pub const STATUS_WARNING: i32 = 2;
pub const STATUS_PROCESSING: i32 = 3;

pub const TEMP_SENSOR_NAME: &str = "TempSensor";
pub const PRESSURE_SENSOR_NAME: &str = "PressureSensor";
pub const HUMIDITY_SENSOR_NAME: &str = "HumiditySensor";
pub const HVAC_ACTUATOR_NAME: &str = "HvacActuator";
pub const HUMIDIFIER_ACTUATOR_NAME: &str = "HumidifierActuator";
pub const LED_ACTUATOR_NAME: &str = "LedActuator";
pub const SYSTEM_PERF_NAME: &str = "SystemPerfMsg";

/// Actuation command. Encoded on the wire as its integer code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Command {
    Off,
    On,
    Update,
    SetValue,
    GetValue,
}

impl Command {
    pub fn code(self) -> i32 {
        match self {
            Command::Off => 0,
            Command::On => 1,
            Command::Update => 2,
            Command::SetValue => 3,
            Command::GetValue => 4,
        }
    }
}

impl From<Command> for i32 {
    fn from(command: Command) -> Self {
        command.code()
    }
}

impl TryFrom<i32> for Command {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Command::Off),
            1 => Ok(Command::On),
            2 => Ok(Command::Update),
            3 => Ok(Command::SetValue),
            4 => Ok(Command::GetValue),
            other => Err(format!("unknown actuator command code {}", other)),
        }
    }
}

impl Default for Command {
    fn default() -> Self {
        Command::Off
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Command::Off => "OFF",
            Command::On => "ON",
            Command::Update => "UPDATE",
            Command::SetValue => "SET_VALUE",
            Command::GetValue => "GET_VALUE",
        };
        f.write_str(label)
    }
}

/// Fields shared by every record that crosses the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IotMeta {
    pub name: String,

    #[serde(rename = "typeID")]
    pub type_id: i32,

    #[serde(rename = "timeStamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "statusCode")]
    pub status_code: i32,

    #[serde(rename = "hasError")]
    pub has_error: bool,

    #[serde(rename = "locationID")]
    pub location_id: String,

    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl IotMeta {
    pub fn new(name: impl Into<String>, type_id: i32) -> Self {
        Self {
            name: name.into(),
            type_id,
            ..Self::default()
        }
    }

    /// Refresh the timestamp to now.
    pub fn touch(&mut self) {
        self.timestamp = Utc::now();
    }
}

impl Default for IotMeta {
    fn default() -> Self {
        Self {
            name: NOT_SET.to_string(),
            type_id: 0,
            timestamp: Utc::now(),
            status_code: STATUS_OK,
            has_error: false,
            location_id: DEFAULT_LOCATION_ID.to_string(),
            latitude: 0.0,
            longitude: 0.0,
            elevation: 0.0,
        }
    }
}

/// One reading from one logical sensor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorReading {
    #[serde(flatten)]
    pub meta: IotMeta,

    pub value: f64,
}

impl SensorReading {
    pub fn new(type_id: i32, name: impl Into<String>, value: f64) -> Self {
        Self {
            meta: IotMeta::new(name, type_id),
            value,
        }
    }

    pub fn type_id(&self) -> i32 {
        self.meta.type_id
    }

    pub fn location_id(&self) -> &str {
        &self.meta.location_id
    }

    pub fn set_location_id(&mut self, location_id: impl Into<String>) {
        self.meta.location_id = location_id.into();
        self.meta.touch();
    }
}

/// An actuation directive, or (once flagged) the outcome of one.
///
/// The response flag only ever moves from `false` to `true`; see
/// [`ActuatorCommand::set_as_response`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorCommand {
    #[serde(flatten)]
    pub meta: IotMeta,

    pub command: Command,

    pub value: f64,

    #[serde(rename = "stateData")]
    pub state_data: Option<String>,

    #[serde(rename = "isResponse")]
    is_response: bool,
}

impl ActuatorCommand {
    pub fn new(type_id: i32, command: Command, value: f64) -> Self {
        Self {
            meta: IotMeta::new(actuator_name(type_id), type_id),
            command,
            value,
            state_data: None,
            is_response: false,
        }
    }

    pub fn with_location(mut self, location_id: impl Into<String>) -> Self {
        self.meta.location_id = location_id.into();
        self
    }

    pub fn with_state_data(mut self, state_data: impl Into<String>) -> Self {
        self.state_data = Some(state_data.into());
        self
    }

    pub fn type_id(&self) -> i32 {
        self.meta.type_id
    }

    pub fn location_id(&self) -> &str {
        &self.meta.location_id
    }

    pub fn is_response(&self) -> bool {
        self.is_response
    }

    /// Mark this record as an outcome report. There is no inverse.
    pub fn set_as_response(&mut self) {
        self.is_response = true;
        self.meta.touch();
    }

    /// Build the response record for this command with the sink's status.
    pub fn to_response(&self, status_code: i32) -> ActuatorCommand {
        let mut response = self.clone();
        response.meta.status_code = status_code;
        response.meta.has_error = status_code != STATUS_OK;
        response.set_as_response();
        response
    }

    /// The triple compared by the suppression cache.
    pub fn actuation_key(&self) -> (Command, f64, Option<&str>) {
        (self.command, self.value, self.state_data.as_deref())
    }
}

/// CPU and memory utilization for one performance tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSample {
    #[serde(flatten)]
    pub meta: IotMeta,

    #[serde(rename = "cpuUtil")]
    pub cpu_util_pct: f64,

    #[serde(rename = "memUtil")]
    pub mem_util_pct: f64,
}

impl PerformanceSample {
    /// Utilization values are clamped to `[0, 100]`.
    pub fn new(location_id: impl Into<String>, cpu_util_pct: f64, mem_util_pct: f64) -> Self {
        let mut meta = IotMeta::new(SYSTEM_PERF_NAME, SYSTEM_PERF_TYPE);
        meta.location_id = location_id.into();
        Self {
            meta,
            cpu_util_pct: clamp_pct(cpu_util_pct),
            mem_util_pct: clamp_pct(mem_util_pct),
        }
    }

    pub fn location_id(&self) -> &str {
        &self.meta.location_id
    }
}

impl Default for PerformanceSample {
    fn default() -> Self {
        Self {
            meta: IotMeta::new(SYSTEM_PERF_NAME, SYSTEM_PERF_TYPE),
            cpu_util_pct: 0.0,
            mem_util_pct: 0.0,
        }
    }
}

fn clamp_pct(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn actuator_name(type_id: i32) -> &'static str {
    match type_id {
        HVAC_ACTUATOR_TYPE => HVAC_ACTUATOR_NAME,
        HUMIDIFIER_ACTUATOR_TYPE => HUMIDIFIER_ACTUATOR_NAME,
        LED_DISPLAY_ACTUATOR_TYPE => LED_ACTUATOR_NAME,
        _ => NOT_SET,
    }
}
