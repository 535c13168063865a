//! CPU usage of a single watched process.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tpu_telemetry_core::{MeasurementSource, Reading, SourceError, Unit};
use tracing::info;

use super::{parse_error, BROKER_CPU_USAGE};

/// CPU usage of the process named in a PID file, in percent of one core.
pub struct ProcessCpuSource {
    pid: u32,
    stat_path: PathBuf,
    ticks_per_sec: f64,
    last: Option<(u64, Instant)>,
    last_sample: f64,
}

impl ProcessCpuSource {
    /// Reads the PID from the first line of `pid_file` and checks the process
    /// exists under `proc_root`.
    pub fn from_pid_file(proc_root: &Path, pid_file: &Path) -> Result<Self, SourceError> {
        let content = fs::read_to_string(pid_file)?;
        let pid: u32 = content
            .lines()
            .next()
            .map(str::trim)
            .and_then(|line| line.parse().ok())
            .ok_or_else(|| parse_error(pid_file, "no pid on first line"))?;

        let stat_path = proc_root.join(pid.to_string()).join("stat");
        if !stat_path.exists() {
            return Err(SourceError::Unavailable(format!("process {} not running", pid)));
        }

        info!("Watching process {} from {}", pid, pid_file.display());
        Ok(Self {
            pid,
            stat_path,
            ticks_per_sec: clock_ticks_per_sec(),
            last: None,
            last_sample: 0.0,
        })
    }

    /// Parses utime + stime (in clock ticks) from `/proc/<pid>/stat`.
    ///
    /// The command name may contain spaces or parentheses, so fields are
    /// counted from the last `)`.
    fn parse_cpu_ticks(content: &str) -> Option<u64> {
        let rest = &content[content.rfind(')')? + 1..];
        let fields: Vec<&str> = rest.split_whitespace().collect();
        // fields[0] is state (field 3); utime and stime are fields 14 and 15
        let utime: u64 = fields.get(11)?.parse().ok()?;
        let stime: u64 = fields.get(12)?.parse().ok()?;
        Some(utime + stime)
    }

    fn percent(tick_delta: u64, ticks_per_sec: f64, elapsed_secs: f64) -> f64 {
        if elapsed_secs <= 0.0 {
            return 0.0;
        }
        100.0 * (tick_delta as f64 / ticks_per_sec) / elapsed_secs
    }
}

impl MeasurementSource for ProcessCpuSource {
    fn id(&self) -> &str {
        "broker_cpu"
    }

    fn sample(&mut self) -> Result<Vec<Reading>, SourceError> {
        let content = fs::read_to_string(&self.stat_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SourceError::Unavailable(format!("process {} exited", self.pid)),
            _ => SourceError::Io(e),
        })?;
        let ticks = Self::parse_cpu_ticks(&content)
            .ok_or_else(|| parse_error(&self.stat_path, "malformed stat"))?;
        let now = Instant::now();

        if let Some((last_ticks, last_time)) = self.last {
            let elapsed = now.duration_since(last_time).as_secs_f64();
            if elapsed > 0.0 {
                self.last_sample = Self::percent(
                    ticks.saturating_sub(last_ticks),
                    self.ticks_per_sec,
                    elapsed,
                );
            }
        }
        self.last = Some((ticks, now));

        Ok(vec![Reading::scalar(
            BROKER_CPU_USAGE,
            self.last_sample,
            Unit::Percent,
        )])
    }
}

fn clock_ticks_per_sec() -> f64 {
    // SAFETY: sysconf only reads a configuration value.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as f64
    } else {
        100.0
    }
}
