//! Host CPU and memory utilization, sampled on a timer.

mod procfs;

#[cfg(test)]
mod tests;

pub use procfs::{parse_cpu_times, parse_mem_util, CpuTimes, CpuUtilTask, MemUtilTask};

use crate::config::DEFAULT_POLL_CYCLE_SECS;
use crate::data::PerformanceSample;
use crate::listener::DataMessageListener;
use crate::scheduler::PollScheduler;
use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error};

/// One utilization metric of the host.
pub trait SystemUtilTask: Send {
    fn name(&self) -> &str;

    fn type_id(&self) -> i32;

    /// Current utilization percentage.
    fn telemetry_value(&mut self) -> Result<f64>;
}

struct Tasks {
    cpu: Box<dyn SystemUtilTask>,
    mem: Box<dyn SystemUtilTask>,
}

pub struct PerformanceManager {
    location_id: String,
    poll_interval: Duration,
    tasks: Arc<Mutex<Tasks>>,
    scheduler: PollScheduler,
}

impl PerformanceManager {
    pub fn new(
        location_id: impl Into<String>,
        poll_cycle_secs: i64,
        cpu: Box<dyn SystemUtilTask>,
        mem: Box<dyn SystemUtilTask>,
    ) -> Self {
        let poll_cycle_secs = if poll_cycle_secs <= 0 {
            DEFAULT_POLL_CYCLE_SECS
        } else {
            poll_cycle_secs
        };

        Self {
            location_id: location_id.into(),
            poll_interval: Duration::from_secs(poll_cycle_secs as u64),
            tasks: Arc::new(Mutex::new(Tasks { cpu, mem })),
            scheduler: PollScheduler::new("system-performance"),
        }
    }

    /// Manager reading the host's `/proc` files.
    pub fn for_host(location_id: impl Into<String>, poll_cycle_secs: i64) -> Self {
        Self::new(
            location_id,
            poll_cycle_secs,
            Box::new(CpuUtilTask::new()),
            Box::new(MemUtilTask::new()),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Take one sample. `None` if either metric could not be read.
    pub fn sample(&self) -> Option<PerformanceSample> {
        take_sample(&self.tasks, &self.location_id)
    }

    pub fn start(&self, listener: Arc<dyn DataMessageListener>) -> bool {
        let tasks = Arc::clone(&self.tasks);
        let location_id = self.location_id.clone();

        self.scheduler.start(self.poll_interval, move || {
            let tasks = Arc::clone(&tasks);
            let location_id = location_id.clone();
            let listener = Arc::clone(&listener);
            async move {
                if let Some(sample) = take_sample(&tasks, &location_id) {
                    listener.on_performance_sample(sample).await;
                }
            }
        })
    }

    pub async fn stop(&self) -> bool {
        self.scheduler.stop().await
    }
}

fn take_sample(tasks: &Mutex<Tasks>, location_id: &str) -> Option<PerformanceSample> {
    let mut tasks = tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let cpu = read_task(&mut *tasks.cpu)?;
    let mem = read_task(&mut *tasks.mem)?;

    let sample = PerformanceSample::new(location_id, cpu, mem);
    debug!(
        cpu_util = sample.cpu_util_pct,
        mem_util = sample.mem_util_pct,
        "Performance sample"
    );
    Some(sample)
}

fn read_task(task: &mut dyn SystemUtilTask) -> Option<f64> {
    match task.telemetry_value() {
        Ok(value) => Some(value),
        Err(e) => {
            error!(
                task = task.name(),
                type_id = task.type_id(),
                error = %e,
                "System utilization read failed, skipping this tick"
            );
            None
        }
    }
}
