use super::SystemUtilTask;
use crate::data::{CPU_UTIL_TYPE, MEM_UTIL_TYPE};
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

const PROC_STAT: &str = "/proc/stat";
const PROC_MEMINFO: &str = "/proc/meminfo";

/// Aggregate jiffy counters from the `cpu` line of `/proc/stat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

impl CpuTimes {
    /// Busy percentage between `earlier` and `self`.
    pub fn util_since(&self, earlier: &CpuTimes) -> f64 {
        let total = self.total.saturating_sub(earlier.total);
        if total == 0 {
            return 0.0;
        }
        let idle = self.idle.saturating_sub(earlier.idle).min(total);
        (total - idle) as f64 * 100.0 / total as f64
    }
}

/// Parse the aggregate `cpu` line. Idle time includes iowait; guest time
/// is already counted in user time and is left out of the total.
pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|f| f.parse::<u64>())
        .collect::<Result<_, _>>()
        .ok()?;

    if fields.len() < 4 {
        return None;
    }

    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    let total = fields.iter().sum();
    Some(CpuTimes { idle, total })
}

/// Used memory percentage from `/proc/meminfo` (`MemTotal - MemAvailable`).
pub fn parse_mem_util(meminfo: &str) -> Option<f64> {
    let mut total = None;
    let mut available = None;

    for line in meminfo.lines() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("MemTotal:") => total = parts.next().and_then(|v| v.parse::<u64>().ok()),
            Some("MemAvailable:") => {
                available = parts.next().and_then(|v| v.parse::<u64>().ok())
            }
            _ => {}
        }
    }

    let total = total.filter(|t| *t > 0)?;
    let available = available?.min(total);
    Some((total - available) as f64 * 100.0 / total as f64)
}

/// CPU utilization between consecutive reads; the first read covers the
/// time since boot.
pub struct CpuUtilTask {
    path: PathBuf,
    previous: Option<CpuTimes>,
}

impl CpuUtilTask {
    pub fn new() -> Self {
        Self::with_path(PROC_STAT)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            previous: None,
        }
    }
}

impl Default for CpuUtilTask {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemUtilTask for CpuUtilTask {
    fn name(&self) -> &str {
        "CpuUtil"
    }

    fn type_id(&self) -> i32 {
        CPU_UTIL_TYPE
    }

    fn telemetry_value(&mut self) -> Result<f64> {
        let stat = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let current = parse_cpu_times(&stat)
            .ok_or_else(|| anyhow!("No aggregate cpu line in {}", self.path.display()))?;

        let baseline = self.previous.unwrap_or(CpuTimes { idle: 0, total: 0 });
        self.previous = Some(current);

        Ok(current.util_since(&baseline).clamp(0.0, 100.0))
    }
}

pub struct MemUtilTask {
    path: PathBuf,
}

impl MemUtilTask {
    pub fn new() -> Self {
        Self::with_path(PROC_MEMINFO)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for MemUtilTask {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemUtilTask for MemUtilTask {
    fn name(&self) -> &str {
        "MemUtil"
    }

    fn type_id(&self) -> i32 {
        MEM_UTIL_TYPE
    }

    fn telemetry_value(&mut self) -> Result<f64> {
        let meminfo = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let util = parse_mem_util(&meminfo).ok_or_else(|| {
            anyhow!("MemTotal/MemAvailable missing in {}", self.path.display())
        })?;
        Ok(util.clamp(0.0, 100.0))
    }
}
