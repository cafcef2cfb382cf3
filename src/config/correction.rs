use super::{
    CdaConfig, DEFAULT_HVAC_CEILING, DEFAULT_HVAC_FLOOR, DEFAULT_INBOUND_CAPACITY,
    DEFAULT_POLL_CYCLE_SECS, DEFAULT_PUBLISH_TIMEOUT_SECS, DEFAULT_QOS,
};
use crate::data::DEFAULT_LOCATION_ID;
use std::fmt;
use tracing::warn;

/// One unsafe setting that was replaced at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigCorrection {
    pub field: &'static str,
    pub original: String,
    pub corrected: String,
}

impl fmt::Display for ConfigCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.original, self.corrected)
    }
}

impl CdaConfig {
    /// Replace invalid settings with safe defaults.
    ///
    /// Never fails; each replacement is logged at warn level and returned.
    pub fn correct(&mut self) -> Vec<ConfigCorrection> {
        let mut corrections = Vec::new();

        let device = &mut self.device;
        if device.location_id.trim().is_empty() {
            corrections.push(correction(
                "device.location_id",
                &device.location_id,
                DEFAULT_LOCATION_ID,
            ));
            device.location_id = DEFAULT_LOCATION_ID.to_string();
        }

        if device.poll_cycle_secs <= 0 {
            corrections.push(correction(
                "device.poll_cycle_secs",
                device.poll_cycle_secs,
                DEFAULT_POLL_CYCLE_SECS,
            ));
            device.poll_cycle_secs = DEFAULT_POLL_CYCLE_SECS;
        }

        let floor = device.trigger_hvac_temp_floor;
        let ceiling = device.trigger_hvac_temp_ceiling;
        if !floor.is_finite() || !ceiling.is_finite() || floor >= ceiling {
            corrections.push(correction(
                "device.trigger_hvac_temp_floor/ceiling",
                format!("{}/{}", floor, ceiling),
                format!("{}/{}", DEFAULT_HVAC_FLOOR, DEFAULT_HVAC_CEILING),
            ));
            device.trigger_hvac_temp_floor = DEFAULT_HVAC_FLOOR;
            device.trigger_hvac_temp_ceiling = DEFAULT_HVAC_CEILING;
        }

        let mqtt = &mut self.mqtt;
        if !(0..=2).contains(&mqtt.default_qos) {
            corrections.push(correction("mqtt.default_qos", mqtt.default_qos, DEFAULT_QOS));
            mqtt.default_qos = DEFAULT_QOS;
        }

        if mqtt.publish_timeout_secs == 0 {
            corrections.push(correction(
                "mqtt.publish_timeout_secs",
                0,
                DEFAULT_PUBLISH_TIMEOUT_SECS,
            ));
            mqtt.publish_timeout_secs = DEFAULT_PUBLISH_TIMEOUT_SECS;
        }

        // Bounded channels cannot have zero capacity
        if mqtt.inbound_capacity == 0 {
            corrections.push(correction(
                "mqtt.inbound_capacity",
                0,
                DEFAULT_INBOUND_CAPACITY,
            ));
            mqtt.inbound_capacity = DEFAULT_INBOUND_CAPACITY;
        }

        let sensors = &mut self.sensors;
        for (field, min, max) in [
            (
                "sensors.temperature_min/max",
                &mut sensors.temperature_min,
                &mut sensors.temperature_max,
            ),
            (
                "sensors.pressure_min/max",
                &mut sensors.pressure_min,
                &mut sensors.pressure_max,
            ),
            (
                "sensors.humidity_min/max",
                &mut sensors.humidity_min,
                &mut sensors.humidity_max,
            ),
        ] {
            if *min > *max {
                corrections.push(correction(
                    field,
                    format!("{}/{}", min, max),
                    format!("{}/{}", max, min),
                ));
                std::mem::swap(min, max);
            }
        }

        for c in &corrections {
            warn!(
                field = c.field,
                original = %c.original,
                corrected = %c.corrected,
                "Invalid configuration value corrected"
            );
        }

        corrections
    }
}

fn correction(
    field: &'static str,
    original: impl fmt::Display,
    corrected: impl fmt::Display,
) -> ConfigCorrection {
    ConfigCorrection {
        field,
        original: original.to_string(),
        corrected: corrected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config_needs_no_corrections() {
        let mut config = CdaConfig::default();
        assert!(config.correct().is_empty());
    }

    #[test]
    fn test_non_positive_poll_cycle_corrected() {
        for bad in [0, -3] {
            let mut config = CdaConfig::default();
            config.device.poll_cycle_secs = bad;

            let corrections = config.correct();
            assert_eq!(corrections.len(), 1);
            assert_eq!(corrections[0].field, "device.poll_cycle_secs");
            assert_eq!(config.device.poll_cycle_secs, 5);
        }
    }

    #[test]
    fn test_inverted_hvac_thresholds_reset() {
        let mut config = CdaConfig::default();
        config.device.trigger_hvac_temp_floor = 30.0;
        config.device.trigger_hvac_temp_ceiling = 20.0;

        let corrections = config.correct();
        assert_eq!(corrections.len(), 1);
        assert_eq!(config.device.trigger_hvac_temp_floor, 18.0);
        assert_eq!(config.device.trigger_hvac_temp_ceiling, 28.0);
    }

    #[test]
    fn test_equal_or_nan_hvac_thresholds_reset() {
        let mut config = CdaConfig::default();
        config.device.trigger_hvac_temp_floor = 22.0;
        config.device.trigger_hvac_temp_ceiling = 22.0;
        assert_eq!(config.correct().len(), 1);

        let mut config = CdaConfig::default();
        config.device.trigger_hvac_temp_ceiling = f64::NAN;
        assert_eq!(config.correct().len(), 1);
        assert_eq!(config.device.trigger_hvac_temp_ceiling, 28.0);
    }

    #[test]
    fn test_mqtt_settings_corrected() {
        let mut config = CdaConfig::default();
        config.mqtt.default_qos = 5;
        config.mqtt.publish_timeout_secs = 0;
        config.mqtt.inbound_capacity = 0;

        let fields: Vec<&str> = config.correct().iter().map(|c| c.field).collect();
        assert_eq!(
            fields,
            vec!["mqtt.default_qos", "mqtt.publish_timeout_secs", "mqtt.inbound_capacity"]
        );
        assert_eq!(config.mqtt.default_qos, 1);
        assert_eq!(config.mqtt.publish_timeout_secs, 5);
        assert_eq!(config.mqtt.inbound_capacity, 64);
    }

    #[test]
    fn test_blank_location_replaced() {
        let mut config = CdaConfig::default();
        config.device.location_id = "  ".to_string();

        let corrections = config.correct();
        assert_eq!(corrections.len(), 1);
        assert_eq!(config.device.location_id, "constraineddevice001");
    }

    #[test]
    fn test_swapped_sensor_range_fixed() {
        let mut config = CdaConfig::default();
        config.sensors.pressure_min = 1030.0;
        config.sensors.pressure_max = 990.0;

        let corrections = config.correct();
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].to_string(), "sensors.pressure_min/max: 1030/990 -> 990/1030");
        assert_eq!(config.sensors.pressure_min, 990.0);
        assert_eq!(config.sensors.pressure_max, 1030.0);
    }
}
