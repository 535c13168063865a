//! GPS source backed by a gpsd JSON session.

use serde::Deserialize;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::TcpStream;
use std::time::Duration;
use tpu_telemetry_core::{MeasurementSource, Reading, SourceError, Unit};
use tracing::{debug, info, warn};

use super::{GPS_GROUND_SPEED, GPS_LOCATION, GPS_MODE};

/// Enables streaming of JSON reports on a gpsd connection.
const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

/// gpsd reports speed in m/s.
const MPS_TO_KNOTS: f64 = 1.943_844_492;

/// The subset of gpsd reports we care about.
#[derive(Debug, Deserialize)]
#[serde(tag = "class")]
enum Report {
    #[serde(rename = "TPV")]
    Tpv(TpvReport),
    #[serde(other)]
    Other,
}

/// Time-position-velocity report. Fields are absent without a fix.
#[derive(Debug, Deserialize)]
struct TpvReport {
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    speed: Option<f64>,
}

/// GPS fix readings from one persistent gpsd session.
pub struct GpsSource {
    reader: BufReader<TcpStream>,
    line: Vec<u8>,
}

impl GpsSource {
    /// Connects to gpsd at `address` and enables watch mode.
    ///
    /// Each sample reads at most one report and waits no longer than
    /// `read_timeout` for it.
    pub fn connect(address: &str, read_timeout: Duration) -> Result<Self, SourceError> {
        let stream = TcpStream::connect(address)?;
        stream.set_read_timeout(Some(read_timeout))?;
        let mut writer = stream.try_clone()?;
        writer.write_all(WATCH_COMMAND)?;
        writer.flush()?;

        info!("Connected to gpsd at {}", address);
        Ok(Self {
            reader: BufReader::new(stream),
            line: Vec::new(),
        })
    }

    /// Converts one gpsd report line into readings.
    fn parse_report(line: &str) -> Result<Vec<Reading>, serde_json::Error> {
        match serde_json::from_str::<Report>(line)? {
            Report::Tpv(tpv) => Ok(Self::tpv_readings(&tpv)),
            Report::Other => Ok(Vec::new()),
        }
    }

    /// Mode always; speed and location only when present and usable.
    fn tpv_readings(tpv: &TpvReport) -> Vec<Reading> {
        let mut readings = vec![Reading::scalar(GPS_MODE, tpv.mode as f64, Unit::Enum)];

        if let Some(speed) = tpv.speed.filter(|s| s.is_finite()) {
            readings.push(Reading::scalar(
                GPS_GROUND_SPEED,
                speed * MPS_TO_KNOTS,
                Unit::Knot,
            ));
        }

        if let (Some(lat), Some(lon)) = (tpv.lat, tpv.lon) {
            if lat.is_finite() && lon.is_finite() && lat != 0.0 && lon != 0.0 {
                readings.push(Reading::new(GPS_LOCATION, vec![lat, lon], Unit::Coordinate));
            }
        }

        readings
    }

    /// Decodes one complete line. Undecodable lines yield no readings.
    fn report_readings(line: &[u8]) -> Vec<Reading> {
        let line = match std::str::from_utf8(line) {
            Ok(line) => line.trim_end(),
            Err(e) => {
                warn!("Skipping gpsd report that is not UTF-8: {}", e);
                return Vec::new();
            }
        };
        match Self::parse_report(line) {
            Ok(readings) => readings,
            Err(e) => {
                warn!("Skipping unparsable gpsd report: {}", e);
                Vec::new()
            }
        }
    }
}

impl MeasurementSource for GpsSource {
    fn id(&self) -> &str {
        "gps"
    }

    fn sample(&mut self) -> Result<Vec<Reading>, SourceError> {
        // A timed-out read may leave a partial line behind; keep it and finish
        // it on the next call.
        match self.reader.read_until(b'\n', &mut self.line) {
            Ok(0) => Err(SourceError::Unavailable(
                "gpsd closed the connection".to_string(),
            )),
            Ok(_) => {
                let readings = Self::report_readings(&self.line);
                self.line.clear();
                Ok(readings)
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                debug!("No gpsd report within timeout");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}
