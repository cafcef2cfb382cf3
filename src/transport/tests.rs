use super::mqtt::route_publish;
use super::*;
use crate::config::MqttConfig;
use tokio::sync::mpsc;

fn unreachable_broker() -> MqttConfig {
    MqttConfig {
        host: "127.0.0.1".to_string(),
        // Nothing listens on port 1
        port: 1,
        publish_timeout_secs: 1,
        reconnect_delay_secs: 1,
        ..MqttConfig::default()
    }
}

#[test]
fn test_clamp_qos() {
    assert_eq!(clamp_qos(0, 1), 0);
    assert_eq!(clamp_qos(2, 1), 2);
    assert_eq!(clamp_qos(3, 1), 1);
    assert_eq!(clamp_qos(-1, 0), 0);
    // Default itself out of range
    assert_eq!(clamp_qos(9, 7), 2);
}

#[test]
fn test_route_known_topic() {
    let message = route_publish("PIOT/ConstrainedDevice/ActuatorCmd", br#"{"command":1}"#).unwrap();
    assert_eq!(message.resource, ResourceName::ActuatorCommand);
    assert_eq!(message.payload, r#"{"command":1}"#);
}

#[test]
fn test_route_drops_unknown_topic_and_bad_payload() {
    assert!(route_publish("some/other/topic", b"{}").is_none());
    assert!(route_publish("PIOT/ConstrainedDevice/ActuatorCmd", &[0xff, 0xfe]).is_none());
}

#[test]
fn test_client_id_defaults_to_location() {
    let (tx, _rx) = mpsc::channel(4);
    let connector = MqttConnector::new(&MqttConfig::default(), "lab-7", tx);
    assert_eq!(connector.client_id(), "lab-7");

    let (tx, _rx) = mpsc::channel(4);
    let config = MqttConfig {
        client_id: "cda-explicit".to_string(),
        ..MqttConfig::default()
    };
    let connector = MqttConnector::new(&config, "lab-7", tx);
    assert_eq!(connector.client_id(), "cda-explicit");
}

#[tokio::test]
async fn test_operations_without_session_fail() {
    let (tx, _rx) = mpsc::channel(4);
    let connector = MqttConnector::new(&unreachable_broker(), "lab-7", tx);

    assert!(!connector.is_connected());
    assert!(!connector.disconnect().await);
    assert!(!connector.publish(ResourceName::SensorData, "{}", 1).await);
    assert!(!connector.subscribe(ResourceName::ActuatorCommand, 1).await);
    assert!(!connector.unsubscribe(ResourceName::ActuatorCommand).await);
}

#[tokio::test]
async fn test_empty_payload_fails_fast() {
    let (tx, _rx) = mpsc::channel(4);
    let connector = MqttConnector::new(&unreachable_broker(), "lab-7", tx);
    assert!(!connector.publish(ResourceName::SensorData, "", 1).await);
}

#[tokio::test]
async fn test_session_lifecycle_without_broker() {
    let (tx, _rx) = mpsc::channel(4);
    let connector = MqttConnector::new(&unreachable_broker(), "lab-7", tx);

    assert!(connector.connect().await);
    assert!(!connector.connect().await);

    // Recorded while the broker is unreachable, issued on CONNACK
    assert!(connector.subscribe(ResourceName::ActuatorCommand, 7).await);
    assert!(!connector.is_connected());
    assert!(!connector.publish(ResourceName::SensorData, "{}", 1).await);

    assert!(connector.unsubscribe(ResourceName::ActuatorCommand).await);
    assert!(!connector.unsubscribe(ResourceName::ActuatorCommand).await);

    assert!(connector.disconnect().await);
    assert!(!connector.disconnect().await);

    // A closed session can be reopened
    assert!(connector.connect().await);
    assert!(connector.disconnect().await);
}
