//! Measurement sources.
//!
//! Linux implementations of the TPU's on-board and GPS measurements. Every
//! source reads from a configurable `/proc` or `/sys` root so tests can point
//! it at a fixture tree.

mod cpu;
mod gps;
mod memory;
mod process;
mod temperature;

pub use cpu::CpuUsageSource;
pub use gps::GpsSource;
pub use memory::MemAvailableSource;
pub use process::ProcessCpuSource;
pub use temperature::CpuTempSource;

use std::path::Path;
use std::time::Duration;
use tpu_telemetry_core::{MeasurementSource, SourceError};
use tracing::warn;

use crate::config::SourcesConfig;

pub const CPU_TEMP: &str = "TPU/OnBoard/CpuTemp";
pub const CPU_USAGE: &str = "TPU/OnBoard/CpuUsage";
pub const BROKER_CPU_USAGE: &str = "TPU/OnBoard/BrokerCpuUsage";
pub const MEM_AVAILABLE: &str = "TPU/OnBoard/MemAvailable";
pub const GPS_MODE: &str = "TPU/GPS/Mode";
pub const GPS_GROUND_SPEED: &str = "TPU/GPS/GroundSpeed";
pub const GPS_LOCATION: &str = "TPU/GPS/Location";

fn parse_error(path: &Path, what: &str) -> SourceError {
    SourceError::Parse(format!("{}: {}", path.display(), what))
}

/// A constructed source and the interval it should be polled at.
pub struct ConfiguredSource {
    pub source: Box<dyn MeasurementSource>,
    pub interval_ms: u64,
}

/// Builds every enabled source.
///
/// Sources whose resources cannot be acquired (missing sensor, no PID file,
/// gpsd down) are skipped with a warning so the rest still run.
pub fn from_config(config: &SourcesConfig) -> Vec<ConfiguredSource> {
    let mut sources = Vec::new();
    let proc_root = Path::new(&config.proc_root);
    let sys_root = Path::new(&config.sys_root);

    let mut add = |name: &str, interval_ms: u64, built: Result<Box<dyn MeasurementSource>, SourceError>| {
        match built {
            Ok(source) => sources.push(ConfiguredSource {
                source,
                interval_ms,
            }),
            Err(e) => warn!("Skipping {} source: {}", name, e),
        }
    };

    if config.cpu_temp.enable {
        add(
            "cpu_temp",
            config.cpu_temp.interval_ms,
            CpuTempSource::locate(sys_root, &config.cpu_temp.sensor)
                .map(|s| Box::new(s) as Box<dyn MeasurementSource>),
        );
    }

    if config.cpu_usage.enable {
        add(
            "cpu_usage",
            config.cpu_usage.interval_ms,
            Ok(Box::new(CpuUsageSource::new(proc_root)) as Box<dyn MeasurementSource>),
        );
    }

    if config.broker_cpu.enable {
        add(
            "broker_cpu",
            config.broker_cpu.interval_ms,
            ProcessCpuSource::from_pid_file(proc_root, Path::new(&config.broker_cpu.pid_file))
                .map(|s| Box::new(s) as Box<dyn MeasurementSource>),
        );
    }

    if config.mem_available.enable {
        add(
            "mem_available",
            config.mem_available.interval_ms,
            Ok(Box::new(MemAvailableSource::new(proc_root)) as Box<dyn MeasurementSource>),
        );
    }

    if config.gps.enable {
        add(
            "gps",
            config.gps.interval_ms,
            GpsSource::connect(
                &config.gps.address,
                Duration::from_millis(config.gps.read_timeout_ms),
            )
            .map(|s| Box::new(s) as Box<dyn MeasurementSource>),
        );
    }

    sources
}
