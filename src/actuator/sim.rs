use super::ActuationSink;
use crate::data::STATUS_OK;
use anyhow::Result;
use tracing::info;

/// Emulated actuator that logs each effect and remembers its state.
pub struct SimulatedActuator {
    name: String,
    type_id: i32,
    active: bool,
    value: f64,
    state_data: Option<String>,
}

impl SimulatedActuator {
    pub fn new(name: impl Into<String>, type_id: i32) -> Self {
        Self {
            name: name.into(),
            type_id,
            active: false,
            value: 0.0,
            state_data: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn state_data(&self) -> Option<&str> {
        self.state_data.as_deref()
    }

    fn remember(&mut self, active: bool, value: f64, state_data: Option<&str>) {
        self.active = active;
        self.value = value;
        self.state_data = state_data.map(str::to_string);
    }
}

impl ActuationSink for SimulatedActuator {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_id(&self) -> i32 {
        self.type_id
    }

    fn activate(&mut self, value: f64, state_data: Option<&str>) -> Result<i32> {
        info!(
            actuator = %self.name,
            value = value,
            state_data = state_data.unwrap_or(""),
            "Emulating actuator ON"
        );
        self.remember(true, value, state_data);
        Ok(STATUS_OK)
    }

    fn deactivate(&mut self, value: f64, state_data: Option<&str>) -> Result<i32> {
        info!(actuator = %self.name, "Emulating actuator OFF");
        self.remember(false, value, state_data);
        Ok(STATUS_OK)
    }
}
