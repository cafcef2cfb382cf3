use crate::config::{DeviceConfig, DEFAULT_HVAC_CEILING, DEFAULT_HVAC_FLOOR};
use crate::data::{ActuatorCommand, Command, SensorReading, HVAC_ACTUATOR_TYPE, TEMP_SENSOR_TYPE};
use tracing::warn;

/// Local temperature band rule driving the HVAC actuator.
///
/// At or above the ceiling the HVAC is turned on targeting the ceiling, at
/// or below the floor it is turned on targeting the floor, and in between
/// it is turned off. Only temperature readings are considered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HvacRule {
    floor: f64,
    ceiling: f64,
}

impl HvacRule {
    /// Thresholds that are not finite or not ordered fall back to the defaults.
    pub fn new(floor: f64, ceiling: f64) -> Self {
        if floor.is_finite() && ceiling.is_finite() && floor < ceiling {
            return Self { floor, ceiling };
        }

        warn!(
            floor = floor,
            ceiling = ceiling,
            "Invalid HVAC thresholds, using defaults"
        );
        Self {
            floor: DEFAULT_HVAC_FLOOR,
            ceiling: DEFAULT_HVAC_CEILING,
        }
    }

    /// The configured rule, or `None` when on-device handling is disabled.
    pub fn from_config(config: &DeviceConfig) -> Option<Self> {
        config.handle_temp_change_on_device.then(|| {
            Self::new(
                config.trigger_hvac_temp_floor,
                config.trigger_hvac_temp_ceiling,
            )
        })
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// HVAC command for `reading`, or `None` if the rule does not apply.
    pub fn evaluate(&self, reading: &SensorReading) -> Option<ActuatorCommand> {
        if reading.type_id() != TEMP_SENSOR_TYPE {
            return None;
        }

        let value = reading.value;
        if !value.is_finite() {
            warn!(value = value, "Ignoring non-finite temperature reading");
            return None;
        }

        let cmd = if value >= self.ceiling {
            ActuatorCommand::new(HVAC_ACTUATOR_TYPE, Command::On, self.ceiling)
        } else if value <= self.floor {
            ActuatorCommand::new(HVAC_ACTUATOR_TYPE, Command::On, self.floor)
        } else {
            ActuatorCommand::new(HVAC_ACTUATOR_TYPE, Command::Off, 0.0)
        };

        Some(cmd)
    }
}
