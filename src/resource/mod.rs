use serde::{Deserialize, Serialize};
use std::fmt;


/// Logical pub/sub resources this device produces or consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceName {
    SensorData,
    ActuatorCommand,
    ActuatorResponse,
    ManagementStatus,
    ManagementCommand,
    SystemPerformance,
    UpdateNotifications,
}

/// Logical resource to wire topic. Dispatch in both directions scans this
/// table, so adding a row is the only change needed for a new resource.
static RESOURCE_TOPICS: &[(ResourceName, &str)] = &[
    (ResourceName::SensorData, "PIOT/ConstrainedDevice/SensorMsg"),
    (ResourceName::ActuatorCommand, "PIOT/ConstrainedDevice/ActuatorCmd"),
    (ResourceName::ActuatorResponse, "PIOT/ConstrainedDevice/ActuatorResponse"),
    (ResourceName::ManagementStatus, "PIOT/ConstrainedDevice/MgmtStatusMsg"),
    (ResourceName::ManagementCommand, "PIOT/ConstrainedDevice/MgmtStatusCmd"),
    (ResourceName::SystemPerformance, "PIOT/ConstrainedDevice/SystemPerfMsg"),
    (ResourceName::UpdateNotifications, "PIOT/ConstrainedDevice/UpdateMsg"),
];

impl ResourceName {
    /// Every known resource, in table order.
    pub fn all() -> impl Iterator<Item = ResourceName> {
        RESOURCE_TOPICS.iter().map(|(resource, _)| *resource)
    }

    /// Wire topic for this resource.
    pub fn topic(self) -> &'static str {
        RESOURCE_TOPICS
            .iter()
            .find(|(resource, _)| *resource == self)
            .map(|(_, topic)| *topic)
            .unwrap_or_default()
    }

    /// Resolve a wire topic back to its resource. Surrounding slashes are
    /// ignored; anything else must match exactly.
    pub fn from_topic(topic: &str) -> Option<ResourceName> {
        let topic = topic.trim_matches('/');
        RESOURCE_TOPICS
            .iter()
            .find(|(_, candidate)| *candidate == topic)
            .map(|(resource, _)| *resource)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic())
    }
}
