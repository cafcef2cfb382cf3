use super::*;
use crate::data::{ActuatorCommand, SensorReading, SYSTEM_PERF_TYPE};
use crate::resource::ResourceName;
use anyhow::anyhow;
use async_trait::async_trait;
use std::io::Write;

const STAT_SAMPLE: &str = "cpu  100 0 50 800 50 0 0 0 0 0\n\
cpu0 50 0 25 400 25 0 0 0 0 0\n\
intr 12345\n";

const MEMINFO_SAMPLE: &str = "MemTotal:        8000000 kB\n\
MemFree:         1000000 kB\n\
MemAvailable:    6000000 kB\n\
Buffers:          200000 kB\n";

struct FixedTask(f64);

impl SystemUtilTask for FixedTask {
    fn name(&self) -> &str {
        "Fixed"
    }

    fn type_id(&self) -> i32 {
        0
    }

    fn telemetry_value(&mut self) -> Result<f64> {
        Ok(self.0)
    }
}

struct BrokenTask;

impl SystemUtilTask for BrokenTask {
    fn name(&self) -> &str {
        "Broken"
    }

    fn type_id(&self) -> i32 {
        0
    }

    fn telemetry_value(&mut self) -> Result<f64> {
        Err(anyhow!("counter unavailable"))
    }
}

#[derive(Default)]
struct SampleRecorder {
    samples: Mutex<Vec<PerformanceSample>>,
}

#[async_trait]
impl DataMessageListener for SampleRecorder {
    async fn on_actuator_command(&self, _cmd: ActuatorCommand) -> Option<ActuatorCommand> {
        None
    }

    async fn on_actuator_response(&self, _response: ActuatorCommand) -> bool {
        false
    }

    async fn on_inbound_message(&self, _resource: ResourceName, _payload: &str) -> bool {
        false
    }

    async fn on_sensor_reading(&self, _reading: SensorReading) -> bool {
        false
    }

    async fn on_performance_sample(&self, sample: PerformanceSample) -> bool {
        self.samples.lock().unwrap().push(sample);
        true
    }
}

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_parse_cpu_times() {
    let times = parse_cpu_times(STAT_SAMPLE).unwrap();
    assert_eq!(times, CpuTimes { idle: 850, total: 1000 });
    assert!(parse_cpu_times("intr 1 2 3\n").is_none());
    assert!(parse_cpu_times("cpu  a b c d\n").is_none());
}

#[test]
fn test_cpu_util_between_samples() {
    let earlier = CpuTimes { idle: 850, total: 1000 };
    let later = CpuTimes { idle: 900, total: 1200 };
    assert_eq!(later.util_since(&earlier), 75.0);

    // No elapsed jiffies
    assert_eq!(earlier.util_since(&earlier), 0.0);
}

#[test]
fn test_parse_mem_util() {
    assert_eq!(parse_mem_util(MEMINFO_SAMPLE), Some(25.0));
    assert_eq!(parse_mem_util("MemTotal: 100 kB\n"), None);
    assert_eq!(parse_mem_util("MemTotal: 0 kB\nMemAvailable: 0 kB\n"), None);
}

#[test]
fn test_cpu_task_reads_file() {
    let file = write_temp(STAT_SAMPLE);
    let mut task = CpuUtilTask::with_path(file.path());

    // Since boot: 150 busy of 1000
    assert_eq!(task.telemetry_value().unwrap(), 15.0);
    assert_eq!(task.type_id(), crate::data::CPU_UTIL_TYPE);

    // Unchanged counters between reads
    assert_eq!(task.telemetry_value().unwrap(), 0.0);
}

#[test]
fn test_mem_task_reads_file() {
    let file = write_temp(MEMINFO_SAMPLE);
    let mut task = MemUtilTask::with_path(file.path());
    assert_eq!(task.telemetry_value().unwrap(), 25.0);
}

#[test]
fn test_missing_proc_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = MemUtilTask::with_path(dir.path().join("meminfo"));
    assert!(task.telemetry_value().is_err());
}

#[test]
fn test_sample_builds_record() {
    let manager = PerformanceManager::new(
        "lab-7",
        5,
        Box::new(FixedTask(12.5)),
        Box::new(FixedTask(140.0)),
    );

    let sample = manager.sample().unwrap();
    assert_eq!(sample.cpu_util_pct, 12.5);
    assert_eq!(sample.mem_util_pct, 100.0);
    assert_eq!(sample.location_id(), "lab-7");
    assert_eq!(sample.meta.type_id, SYSTEM_PERF_TYPE);
}

#[test]
fn test_failed_task_skips_sample() {
    let manager =
        PerformanceManager::new("lab-7", 5, Box::new(BrokenTask), Box::new(FixedTask(10.0)));
    assert!(manager.sample().is_none());
}

#[test]
fn test_non_positive_poll_cycle_uses_default() {
    let manager =
        PerformanceManager::new("lab-7", 0, Box::new(FixedTask(1.0)), Box::new(FixedTask(1.0)));
    assert_eq!(manager.poll_interval(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_timer_delivers_samples() {
    let manager =
        PerformanceManager::new("lab-7", 2, Box::new(FixedTask(30.0)), Box::new(FixedTask(40.0)));
    let recorder = Arc::new(SampleRecorder::default());

    assert!(manager.start(recorder.clone()));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(manager.stop().await);

    let samples = recorder.samples.lock().unwrap();
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| s.cpu_util_pct == 30.0 && s.mem_util_pct == 40.0));
}
