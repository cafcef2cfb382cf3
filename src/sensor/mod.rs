pub mod sim;


pub use sim::SimulatedSensor;

use crate::config::{SensorConfig, DEFAULT_POLL_CYCLE_SECS};
use crate::data::{
    SensorReading, HUMIDITY_SENSOR_NAME, HUMIDITY_SENSOR_TYPE, PRESSURE_SENSOR_NAME,
    PRESSURE_SENSOR_TYPE, TEMP_SENSOR_NAME, TEMP_SENSOR_TYPE,
};
use crate::listener::DataMessageListener;
use crate::scheduler::PollScheduler;
use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Produces one reading per poll for one logical sensor.
pub trait TelemetrySource: Send {
    fn name(&self) -> &str;

    fn type_id(&self) -> i32;

    fn read(&mut self) -> Result<SensorReading>;
}

type SourceList = Arc<Mutex<Vec<Box<dyn TelemetrySource>>>>;

/// Polls every registered source on a fixed interval.
///
/// Readings are stamped with the device location and handed to the
/// listener one at a time, in registration order.
pub struct SensorManager {
    location_id: String,
    poll_interval: Duration,
    sources: SourceList,
    scheduler: PollScheduler,
}

impl SensorManager {
    /// Non-positive `poll_cycle_secs` falls back to the default cadence.
    pub fn new(location_id: impl Into<String>, poll_cycle_secs: i64) -> Self {
        let poll_cycle_secs = if poll_cycle_secs <= 0 {
            warn!(
                poll_cycle_secs = poll_cycle_secs,
                default = DEFAULT_POLL_CYCLE_SECS,
                "Non-positive sensor poll cycle, using default"
            );
            DEFAULT_POLL_CYCLE_SECS
        } else {
            poll_cycle_secs
        };

        Self {
            location_id: location_id.into(),
            poll_interval: Duration::from_secs(poll_cycle_secs as u64),
            sources: Arc::new(Mutex::new(Vec::new())),
            scheduler: PollScheduler::new("sensors"),
        }
    }

    /// Build a manager with the simulated sources enabled in `sensors`.
    pub fn with_simulated_sources(
        location_id: impl Into<String>,
        poll_cycle_secs: i64,
        sensors: &SensorConfig,
    ) -> Self {
        let manager = Self::new(location_id, poll_cycle_secs);

        if sensors.enable_temperature {
            manager.register(Box::new(SimulatedSensor::random(
                TEMP_SENSOR_NAME,
                TEMP_SENSOR_TYPE,
                sensors.temperature_min,
                sensors.temperature_max,
            )));
        }
        if sensors.enable_pressure {
            manager.register(Box::new(SimulatedSensor::random(
                PRESSURE_SENSOR_NAME,
                PRESSURE_SENSOR_TYPE,
                sensors.pressure_min,
                sensors.pressure_max,
            )));
        }
        if sensors.enable_humidity {
            manager.register(Box::new(SimulatedSensor::random(
                HUMIDITY_SENSOR_NAME,
                HUMIDITY_SENSOR_TYPE,
                sensors.humidity_min,
                sensors.humidity_max,
            )));
        }

        manager
    }

    pub fn register(&self, source: Box<dyn TelemetrySource>) {
        info!(
            sensor = source.name(),
            type_id = source.type_id(),
            "Registered telemetry source"
        );
        lock_sources(&self.sources).push(source);
    }

    pub fn source_count(&self) -> usize {
        lock_sources(&self.sources).len()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Read every source once. A failing source is logged and skipped.
    pub fn poll_sources(&self) -> Vec<SensorReading> {
        collect_readings(&self.sources, &self.location_id)
    }

    /// Start the poll timer, delivering readings to `listener`.
    pub fn start(&self, listener: Arc<dyn DataMessageListener>) -> bool {
        let sources = Arc::clone(&self.sources);
        let location_id = self.location_id.clone();

        self.scheduler.start(self.poll_interval, move || {
            let sources = Arc::clone(&sources);
            let location_id = location_id.clone();
            let listener = Arc::clone(&listener);
            async move {
                let readings = collect_readings(&sources, &location_id);
                for reading in readings {
                    listener.on_sensor_reading(reading).await;
                }
            }
        })
    }

    pub async fn stop(&self) -> bool {
        self.scheduler.stop().await
    }
}

fn collect_readings(sources: &SourceList, location_id: &str) -> Vec<SensorReading> {
    let mut sources = lock_sources(sources);
    let mut readings = Vec::with_capacity(sources.len());

    for source in sources.iter_mut() {
        match source.read() {
            Ok(mut reading) => {
                reading.set_location_id(location_id);
                debug!(
                    sensor = source.name(),
                    type_id = reading.type_id(),
                    value = reading.value,
                    "Sensor reading"
                );
                readings.push(reading);
            }
            Err(e) => {
                error!(
                    sensor = source.name(),
                    type_id = source.type_id(),
                    error = %e,
                    "Telemetry source failed, skipping this tick"
                );
            }
        }
    }

    readings
}

fn lock_sources(
    sources: &SourceList,
) -> std::sync::MutexGuard<'_, Vec<Box<dyn TelemetrySource>>> {
    sources
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
