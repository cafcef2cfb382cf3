use super::TelemetrySource;
use crate::data::SensorReading;
use anyhow::{bail, Result};
use rand::Rng;

enum Pattern {
    Random { min: f64, max: f64 },
    DataSet { values: Vec<f64>, next: usize },
}

/// Emulated sensor: uniform random values in a range, or a repeating data set.
pub struct SimulatedSensor {
    name: String,
    type_id: i32,
    pattern: Pattern,
}

impl SimulatedSensor {
    /// Values drawn uniformly from `[min, max]`. Bounds given in the wrong
    /// order are swapped.
    pub fn random(name: impl Into<String>, type_id: i32, min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            name: name.into(),
            type_id,
            pattern: Pattern::Random { min, max },
        }
    }

    /// Values taken from `values` in order, wrapping at the end.
    pub fn from_data_set(name: impl Into<String>, type_id: i32, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            type_id,
            pattern: Pattern::DataSet { values, next: 0 },
        }
    }

    fn next_value(&mut self) -> Result<f64> {
        match &mut self.pattern {
            Pattern::Random { min, max } => {
                if !min.is_finite() || !max.is_finite() {
                    bail!("non-finite range {}..{}", min, max);
                }
                if min == max {
                    return Ok(*min);
                }
                Ok(rand::thread_rng().gen_range(*min..=*max))
            }
            Pattern::DataSet { values, next } => {
                if values.is_empty() {
                    bail!("empty data set");
                }
                let value = values[*next % values.len()];
                *next = (*next + 1) % values.len();
                Ok(value)
            }
        }
    }
}

impl TelemetrySource for SimulatedSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_id(&self) -> i32 {
        self.type_id
    }

    fn read(&mut self) -> Result<SensorReading> {
        let value = self.next_value()?;
        Ok(SensorReading::new(self.type_id, self.name.clone(), value))
    }
}
