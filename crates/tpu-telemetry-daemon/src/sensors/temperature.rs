//! CPU temperature source.

use std::fs;
use std::path::{Path, PathBuf};
use tpu_telemetry_core::{MeasurementSource, Reading, SourceError, Unit};
use tracing::{debug, info};

use super::{parse_error, CPU_TEMP};

/// CPU temperature from hwmon or a thermal zone, in °C.
pub struct CpuTempSource {
    input_path: PathBuf,
}

impl CpuTempSource {
    /// Locates the temperature input for `sensor` under `sys_root`.
    ///
    /// Looks for a `class/hwmon/*` whose `name` matches first, then a
    /// `class/thermal/thermal_zone*` whose `type` matches. Underscores and
    /// dashes are treated alike since drivers disagree (`cpu_thermal` vs
    /// `cpu-thermal`).
    pub fn locate(sys_root: &Path, sensor: &str) -> Result<Self, SourceError> {
        let input_path = Self::find_hwmon(sys_root, sensor)
            .or_else(|| Self::find_thermal_zone(sys_root, sensor))
            .ok_or_else(|| {
                SourceError::Unavailable(format!("temperature sensor {} not found", sensor))
            })?;

        info!("CPU temperature source using {}", input_path.display());
        Ok(Self { input_path })
    }

    fn matches(found: &str, wanted: &str) -> bool {
        found.trim().replace('-', "_") == wanted.replace('-', "_")
    }

    fn find_hwmon(sys_root: &Path, sensor: &str) -> Option<PathBuf> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(sys_root.join("class/hwmon"))
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .collect();
        dirs.sort();

        dirs.into_iter().find_map(|dir| {
            let name = fs::read_to_string(dir.join("name")).ok()?;
            let input = dir.join("temp1_input");
            (Self::matches(&name, sensor) && input.exists()).then_some(input)
        })
    }

    fn find_thermal_zone(sys_root: &Path, sensor: &str) -> Option<PathBuf> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(sys_root.join("class/thermal"))
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .map(|n| n.to_string_lossy().starts_with("thermal_zone"))
                    .unwrap_or(false)
            })
            .collect();
        dirs.sort();

        dirs.into_iter().find_map(|dir| {
            let kind = fs::read_to_string(dir.join("type")).ok()?;
            debug!("Thermal zone {} is {}", dir.display(), kind.trim());
            let input = dir.join("temp");
            (Self::matches(&kind, sensor) && input.exists()).then_some(input)
        })
    }
}

impl MeasurementSource for CpuTempSource {
    fn id(&self) -> &str {
        "cpu_temp"
    }

    fn sample(&mut self) -> Result<Vec<Reading>, SourceError> {
        let raw = fs::read_to_string(&self.input_path)?;
        let millidegrees: f64 = raw
            .trim()
            .parse()
            .map_err(|_| parse_error(&self.input_path, raw.trim()))?;

        Ok(vec![Reading::scalar(
            CPU_TEMP,
            millidegrees / 1000.0,
            Unit::Celsius,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_hwmon(root: &Path, index: u32, name: &str, millidegrees: &str) {
        let dir = root.join(format!("class/hwmon/hwmon{}", index));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("name"), format!("{}\n", name)).unwrap();
        fs::write(dir.join("temp1_input"), millidegrees).unwrap();
    }

    #[test]
    fn test_locate_hwmon() {
        let root = tempfile::tempdir().unwrap();
        add_hwmon(root.path(), 0, "rpi_volt", "0\n");
        add_hwmon(root.path(), 1, "cpu_thermal", "48312\n");

        let mut source = CpuTempSource::locate(root.path(), "cpu_thermal").unwrap();
        let readings = source.sample().unwrap();
        assert_eq!(readings[0].metric_path(), CPU_TEMP);
        assert_eq!(readings[0].unit(), Unit::Celsius);
        assert!((readings[0].values()[0] - 48.312).abs() < 1e-9);
    }

    #[test]
    fn test_locate_thermal_zone_fallback() {
        let root = tempfile::tempdir().unwrap();
        let zone = root.path().join("class/thermal/thermal_zone0");
        fs::create_dir_all(&zone).unwrap();
        fs::write(zone.join("type"), "cpu-thermal\n").unwrap();
        fs::write(zone.join("temp"), "51000\n").unwrap();

        let mut source = CpuTempSource::locate(root.path(), "cpu_thermal").unwrap();
        assert_eq!(source.sample().unwrap()[0].values(), &[51.0]);
    }

    #[test]
    fn test_missing_sensor() {
        let root = tempfile::tempdir().unwrap();
        add_hwmon(root.path(), 0, "nvme", "30000\n");
        assert!(matches!(
            CpuTempSource::locate(root.path(), "cpu_thermal"),
            Err(SourceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_garbage_reading_is_parse_error() {
        let root = tempfile::tempdir().unwrap();
        add_hwmon(root.path(), 0, "cpu_thermal", "hot\n");

        let mut source = CpuTempSource::locate(root.path(), "cpu_thermal").unwrap();
        assert!(matches!(source.sample(), Err(SourceError::Parse(_))));
    }
}
