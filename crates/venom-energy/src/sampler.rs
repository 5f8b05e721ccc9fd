use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use venom_types::{Result, VenomError};

/// Source of raw resource readings.
#[async_trait]
pub trait MetricsSampler: Send + Sync {
    /// CPU utilisation in percent, measured over `window`.
    async fn cpu_percent(&self, window: Duration) -> Result<f64>;

    /// Memory utilisation in percent.
    fn memory_percent(&self) -> Result<f64>;

    /// Temperature in degrees Celsius.
    fn temperature(&self) -> Result<f64>;
}

/// Linux sampler backed by `/proc` and `/sys/class/thermal`.
#[derive(Debug, Clone)]
pub struct ProcfsSampler {
    proc_root: PathBuf,
    thermal_root: PathBuf,
}

impl Default for ProcfsSampler {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            thermal_root: PathBuf::from("/sys/class/thermal"),
        }
    }
}

impl ProcfsSampler {
    pub fn with_roots(proc_root: impl Into<PathBuf>, thermal_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            thermal_root: thermal_root.into(),
        }
    }

    fn cpu_times(&self) -> Result<CpuTimes> {
        let stat = read_sensor_file(&self.proc_root.join("stat"))?;
        parse_cpu_times(&stat)
    }
}

#[async_trait]
impl MetricsSampler for ProcfsSampler {
    async fn cpu_percent(&self, window: Duration) -> Result<f64> {
        let before = self.cpu_times()?;
        tokio::time::sleep(window).await;
        let after = self.cpu_times()?;
        Ok(after.busy_percent_since(&before))
    }

    fn memory_percent(&self) -> Result<f64> {
        let meminfo = read_sensor_file(&self.proc_root.join("meminfo"))?;
        parse_memory_percent(&meminfo)
    }

    fn temperature(&self) -> Result<f64> {
        let zones = std::fs::read_dir(&self.thermal_root)
            .map_err(|e| VenomError::Sensor(format!("{}: {e}", self.thermal_root.display())))?;
        let mut paths: Vec<PathBuf> = zones
            .filter_map(|z| z.ok())
            .filter(|z| z.file_name().to_string_lossy().starts_with("thermal_zone"))
            .map(|z| z.path().join("temp"))
            .collect();
        paths.sort();

        paths
            .iter()
            .filter_map(|p| std::fs::read_to_string(p).ok())
            .find_map(|raw| raw.trim().parse::<f64>().ok())
            .map(|milli| milli / 1000.0)
            .ok_or_else(|| VenomError::Sensor("no readable thermal zone".into()))
    }
}

/// Fixed readings for hosts without procfs and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSampler {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub temperature: Option<f64>,
}

impl StaticSampler {
    pub fn new(cpu_percent: f64, memory_percent: f64) -> Self {
        Self {
            cpu_percent,
            memory_percent,
            temperature: None,
        }
    }
}

#[async_trait]
impl MetricsSampler for StaticSampler {
    async fn cpu_percent(&self, _window: Duration) -> Result<f64> {
        Ok(self.cpu_percent)
    }

    fn memory_percent(&self) -> Result<f64> {
        Ok(self.memory_percent)
    }

    fn temperature(&self) -> Result<f64> {
        self.temperature
            .ok_or_else(|| VenomError::Sensor("no temperature sensor".into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CpuTimes {
    idle: u64,
    total: u64,
}

impl CpuTimes {
    fn busy_percent_since(&self, before: &CpuTimes) -> f64 {
        let total = self.total.saturating_sub(before.total);
        if total == 0 {
            return 0.0;
        }
        let idle = self.idle.saturating_sub(before.idle);
        (total.saturating_sub(idle) as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

fn read_sensor_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| VenomError::Sensor(format!("{}: {e}", path.display())))
}

/// Aggregate counters from the first `cpu ` line of `/proc/stat`.
pub(crate) fn parse_cpu_times(stat: &str) -> Result<CpuTimes> {
    let line = stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| VenomError::Sensor("no aggregate cpu line".into()))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|f| f.parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| VenomError::Sensor(format!("bad cpu counter: {e}")))?;
    if fields.len() < 4 {
        return Err(VenomError::Sensor("truncated cpu line".into()));
    }
    // user nice system idle iowait irq softirq steal
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Ok(CpuTimes {
        idle,
        total: fields.iter().sum(),
    })
}

pub(crate) fn parse_memory_percent(meminfo: &str) -> Result<f64> {
    let field = |name: &str| -> Option<f64> {
        meminfo
            .lines()
            .find(|l| l.starts_with(name) && l[name.len()..].starts_with(':'))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|v| v.parse::<f64>().ok())
    };

    let total = field("MemTotal").ok_or_else(|| VenomError::Sensor("MemTotal missing".into()))?;
    if total <= 0.0 {
        return Err(VenomError::Sensor("MemTotal is zero".into()));
    }
    let available = match field("MemAvailable") {
        Some(v) => v,
        None => {
            field("MemFree").unwrap_or(0.0)
                + field("Buffers").unwrap_or(0.0)
                + field("Cached").unwrap_or(0.0)
        }
    };
    Ok(((total - available) / total * 100.0).clamp(0.0, 100.0))
}
