pub mod sim;


pub use sim::SimulatedActuator;

use crate::data::{
    ActuatorCommand, Command, HUMIDIFIER_ACTUATOR_NAME, HUMIDIFIER_ACTUATOR_TYPE,
    HVAC_ACTUATOR_NAME, HVAC_ACTUATOR_TYPE, LED_ACTUATOR_NAME, LED_DISPLAY_ACTUATOR_TYPE,
};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// Performs the device-specific effect of an actuation command.
pub trait ActuationSink: Send {
    fn name(&self) -> &str;

    fn type_id(&self) -> i32;

    /// Turn on or adjust the actuator. Returns a status code.
    fn activate(&mut self, value: f64, state_data: Option<&str>) -> Result<i32>;

    /// Turn off the actuator. Returns a status code.
    fn deactivate(&mut self, value: f64, state_data: Option<&str>) -> Result<i32>;

    /// OFF deactivates; every other command activates.
    fn apply(&mut self, cmd: &ActuatorCommand) -> Result<i32> {
        match cmd.command {
            Command::Off => self.deactivate(cmd.value, cmd.state_data.as_deref()),
            _ => self.activate(cmd.value, cmd.state_data.as_deref()),
        }
    }
}

/// The last command applied to a sink.
#[derive(Clone, Debug, PartialEq)]
pub struct AppliedCommand {
    pub command: Command,
    pub value: f64,
    pub state_data: Option<String>,
}

impl AppliedCommand {
    fn from_command(cmd: &ActuatorCommand) -> Self {
        Self {
            command: cmd.command,
            value: cmd.value,
            state_data: cmd.state_data.clone(),
        }
    }

    fn matches(&self, cmd: &ActuatorCommand) -> bool {
        (self.command, self.value, self.state_data.as_deref()) == cmd.actuation_key()
    }
}

struct ActuatorSlot {
    sink: Box<dyn ActuationSink>,
    last_applied: Option<AppliedCommand>,
}

/// Routes commands to the sink registered for their type ID.
///
/// The registry is fixed once the manager is shared. Each slot has its own
/// lock, so an actuation in progress on one sink never blocks another.
pub struct ActuatorManager {
    location_id: String,
    slots: HashMap<i32, Mutex<ActuatorSlot>>,
}

impl ActuatorManager {
    pub fn new(location_id: impl Into<String>) -> Self {
        Self {
            location_id: location_id.into(),
            slots: HashMap::new(),
        }
    }

    /// Manager with simulated HVAC, humidifier and LED display sinks.
    pub fn with_simulated_sinks(location_id: impl Into<String>) -> Self {
        let mut manager = Self::new(location_id);
        manager.register(Box::new(SimulatedActuator::new(
            HVAC_ACTUATOR_NAME,
            HVAC_ACTUATOR_TYPE,
        )));
        manager.register(Box::new(SimulatedActuator::new(
            HUMIDIFIER_ACTUATOR_NAME,
            HUMIDIFIER_ACTUATOR_TYPE,
        )));
        manager.register(Box::new(SimulatedActuator::new(
            LED_ACTUATOR_NAME,
            LED_DISPLAY_ACTUATOR_TYPE,
        )));
        manager
    }

    /// Register a sink under its type ID, replacing any earlier one.
    pub fn register(&mut self, sink: Box<dyn ActuationSink>) {
        let type_id = sink.type_id();
        info!(actuator = sink.name(), type_id = type_id, "Registered actuation sink");

        let slot = ActuatorSlot {
            sink,
            last_applied: None,
        };
        if self.slots.insert(type_id, Mutex::new(slot)).is_some() {
            warn!(type_id = type_id, "Replaced existing actuation sink");
        }
    }

    pub fn location_id(&self) -> &str {
        &self.location_id
    }

    pub fn has_sink(&self, type_id: i32) -> bool {
        self.slots.contains_key(&type_id)
    }

    /// The last command applied for `type_id`, if any.
    pub fn last_applied(&self, type_id: i32) -> Option<AppliedCommand> {
        self.slots
            .get(&type_id)
            .and_then(|slot| lock_slot(slot).last_applied.clone())
    }

    /// Apply `cmd` to its sink and return the response record.
    ///
    /// Returns `None` when the command is a response, addressed to another
    /// location, has no registered sink, repeats the last applied command, or
    /// the sink fails.
    pub fn dispatch(&self, cmd: &ActuatorCommand) -> Option<ActuatorCommand> {
        self.dispatch_and_record(cmd, |_| {})
    }

    /// Like [`dispatch`](Self::dispatch), but hands the response to `record`
    /// while the actuator's slot is still locked. Records made this way for
    /// one type ID follow the order the sink saw the commands in.
    pub fn dispatch_and_record<F>(
        &self,
        cmd: &ActuatorCommand,
        record: F,
    ) -> Option<ActuatorCommand>
    where
        F: FnOnce(&ActuatorCommand),
    {
        let type_id = cmd.type_id();

        if cmd.is_response() {
            warn!(type_id = type_id, "Refusing to dispatch a response record");
            return None;
        }

        if cmd.location_id() != self.location_id {
            warn!(
                type_id = type_id,
                location_id = %cmd.location_id(),
                expected = %self.location_id,
                "Command addressed to another location, ignoring"
            );
            return None;
        }

        let Some(slot) = self.slots.get(&type_id) else {
            warn!(type_id = type_id, "No actuation sink registered for type");
            return None;
        };

        let mut slot = lock_slot(slot);

        if slot
            .last_applied
            .as_ref()
            .is_some_and(|last| last.matches(cmd))
        {
            debug!(
                type_id = type_id,
                command = %cmd.command,
                value = cmd.value,
                "Suppressing repeat of last applied command"
            );
            return None;
        }

        let status_code = match slot.sink.apply(cmd) {
            Ok(code) => code,
            Err(e) => {
                error!(
                    actuator = slot.sink.name(),
                    type_id = type_id,
                    command = %cmd.command,
                    error = %e,
                    "Actuation sink failed"
                );
                return None;
            }
        };

        slot.last_applied = Some(AppliedCommand::from_command(cmd));

        info!(
            actuator = slot.sink.name(),
            type_id = type_id,
            command = %cmd.command,
            value = cmd.value,
            status_code = status_code,
            "Actuation applied"
        );

        let response = cmd.to_response(status_code);
        record(&response);
        Some(response)
    }
}

fn lock_slot(slot: &Mutex<ActuatorSlot>) -> MutexGuard<'_, ActuatorSlot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
