//! CPU usage source.

use std::fs;
use std::path::{Path, PathBuf};
use tpu_telemetry_core::{MeasurementSource, Reading, SourceError, Unit};

use super::{parse_error, CPU_USAGE};

/// System-wide CPU usage from `/proc/stat`.
pub struct CpuUsageSource {
    stat_path: PathBuf,
    last_idle: u64,
    last_total: u64,
    last_sample: f64,
}

impl CpuUsageSource {
    /// Creates a source reading `<proc_root>/stat`.
    pub fn new(proc_root: &Path) -> Self {
        Self {
            stat_path: proc_root.join("stat"),
            last_idle: 0,
            last_total: 0,
            last_sample: 0.0,
        }
    }

    /// Parses the aggregate `cpu` line into (idle, total) jiffies.
    fn parse_stat(content: &str) -> Option<(u64, u64)> {
        let line = content.lines().find(|l| l.starts_with("cpu "))?;
        let parts: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .filter_map(|s| s.parse().ok())
            .collect();

        if parts.len() >= 4 {
            // idle + iowait when present
            let idle = parts[3] + parts.get(4).copied().unwrap_or(0);
            let total: u64 = parts.iter().sum();
            Some((idle, total))
        } else {
            None
        }
    }
}

impl MeasurementSource for CpuUsageSource {
    fn id(&self) -> &str {
        "cpu_usage"
    }

    fn sample(&mut self) -> Result<Vec<Reading>, SourceError> {
        let content = fs::read_to_string(&self.stat_path)?;
        let (idle, total) =
            Self::parse_stat(&content).ok_or_else(|| parse_error(&self.stat_path, "no cpu line"))?;

        // First call has nothing to diff against and reports 0.
        if self.last_total > 0 {
            let idle_delta = idle.saturating_sub(self.last_idle);
            let total_delta = total.saturating_sub(self.last_total);

            if total_delta > 0 {
                self.last_sample = 100.0 * (1.0 - (idle_delta as f64 / total_delta as f64));
            }
        }

        self.last_idle = idle;
        self.last_total = total;

        Ok(vec![Reading::scalar(CPU_USAGE, self.last_sample, Unit::Percent)])
    }
}
