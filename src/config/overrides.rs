use super::CdaConfig;
use std::str::FromStr;

impl CdaConfig {
    /// Apply `CDA_*` environment variables on top of the loaded file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CDA_LOCATION_ID") {
            self.device.location_id = v;
        }
        if let Some(n) = parsed(&lookup, "CDA_POLL_CYCLE_SECS") {
            self.device.poll_cycle_secs = n;
        }
        if let Some(b) = parsed(&lookup, "CDA_ENABLE_MQTT_CLIENT") {
            self.device.enable_mqtt_client = b;
        }
        if let Some(v) = lookup("CDA_MQTT_HOST") {
            self.mqtt.host = v;
        }
        if let Some(n) = parsed(&lookup, "CDA_MQTT_PORT") {
            self.mqtt.port = n;
        }
        if let Some(n) = parsed(&lookup, "CDA_MQTT_DEFAULT_QOS") {
            self.mqtt.default_qos = n;
        }
    }
}

fn parsed<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key).and_then(|v| v.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = CdaConfig::default();
        config.apply_overrides_from(lookup_from(&[
            ("CDA_LOCATION_ID", "barn-1"),
            ("CDA_POLL_CYCLE_SECS", "15"),
            ("CDA_ENABLE_MQTT_CLIENT", "false"),
            ("CDA_MQTT_HOST", "mqtt.example.net"),
            ("CDA_MQTT_PORT", "1884"),
            ("CDA_MQTT_DEFAULT_QOS", "0"),
        ]));

        assert_eq!(config.device.location_id, "barn-1");
        assert_eq!(config.device.poll_cycle_secs, 15);
        assert!(!config.device.enable_mqtt_client);
        assert_eq!(config.mqtt.host, "mqtt.example.net");
        assert_eq!(config.mqtt.port, 1884);
        assert_eq!(config.mqtt.default_qos, 0);
    }

    #[test]
    fn test_unparseable_values_ignored() {
        let mut config = CdaConfig::default();
        config.apply_overrides_from(lookup_from(&[
            ("CDA_POLL_CYCLE_SECS", "soon"),
            ("CDA_MQTT_PORT", "99999"),
            ("CDA_ENABLE_MQTT_CLIENT", "maybe"),
        ]));

        assert_eq!(config.device.poll_cycle_secs, 5);
        assert_eq!(config.mqtt.port, 1883);
        assert!(config.device.enable_mqtt_client);
    }

    #[test]
    fn test_no_overrides_leaves_config_unchanged() {
        let mut config = CdaConfig::default();
        config.apply_overrides_from(|_| None);

        assert_eq!(config.device.location_id, "constraineddevice001");
        assert_eq!(config.mqtt.host, "localhost");
    }
}
