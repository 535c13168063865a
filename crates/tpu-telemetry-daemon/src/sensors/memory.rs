//! Available memory source.

use std::fs;
use std::path::{Path, PathBuf};
use tpu_telemetry_core::{MeasurementSource, Reading, SourceError, Unit};

use super::{parse_error, MEM_AVAILABLE};

/// Available memory from `/proc/meminfo`, in MB.
pub struct MemAvailableSource {
    meminfo_path: PathBuf,
}

impl MemAvailableSource {
    /// Creates a source reading `<proc_root>/meminfo`.
    pub fn new(proc_root: &Path) -> Self {
        Self {
            meminfo_path: proc_root.join("meminfo"),
        }
    }

    fn parse_available_kb(content: &str) -> Option<u64> {
        for line in content.lines() {
            if line.starts_with("MemAvailable:") {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 2 {
                    return parts[1].parse().ok();
                }
            }
        }
        None
    }
}

impl MeasurementSource for MemAvailableSource {
    fn id(&self) -> &str {
        "mem_available"
    }

    fn sample(&mut self) -> Result<Vec<Reading>, SourceError> {
        let content = fs::read_to_string(&self.meminfo_path)?;
        let available_kb = Self::parse_available_kb(&content)
            .ok_or_else(|| parse_error(&self.meminfo_path, "no MemAvailable line"))?;

        let available_mb = available_kb as f64 / 1024.0;
        Ok(vec![Reading::scalar(MEM_AVAILABLE, available_mb, Unit::Megabyte)])
    }
}
