//! Reading data model.
//!
//! A [`Reading`] is the only thing a measurement source produces. It carries a
//! metric path, one or more values, and a [`Unit`] from a closed vocabulary.
//! Timestamps are not part of a reading; sinks stamp readings on delivery.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Unit tag describing how to interpret a reading's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// Degrees Celsius.
    #[serde(rename = "celsius")]
    Celsius,
    /// Percentage (may exceed 100 for multi-core process usage).
    #[serde(rename = "percent")]
    Percent,
    /// Knots.
    #[serde(rename = "knot")]
    Knot,
    /// Latitude/longitude pair in decimal degrees.
    #[serde(rename = "coordinate")]
    Coordinate,
    /// Discrete enumerated state.
    #[serde(rename = "enum")]
    Enum,
    /// Mebibytes.
    #[serde(rename = "MB")]
    Megabyte,
}

impl Unit {
    /// Returns the wire tag for this unit.
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Celsius => "celsius",
            Unit::Percent => "percent",
            Unit::Knot => "knot",
            Unit::Coordinate => "coordinate",
            Unit::Enum => "enum",
            Unit::Megabyte => "MB",
        }
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "celsius" => Ok(Unit::Celsius),
            "percent" => Ok(Unit::Percent),
            "knot" => Ok(Unit::Knot),
            "coordinate" => Ok(Unit::Coordinate),
            "enum" => Ok(Unit::Enum),
            "MB" => Ok(Unit::Megabyte),
            _ => Err(Error::InvalidUnit(s.to_string())),
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable sample emitted by a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    metric_path: String,
    values: Vec<f64>,
    unit: Unit,
}

impl Reading {
    /// Creates a reading.
    pub fn new(metric_path: impl Into<String>, values: Vec<f64>, unit: Unit) -> Self {
        Self {
            metric_path: metric_path.into(),
            values,
            unit,
        }
    }

    /// Creates a single-value reading.
    pub fn scalar(metric_path: impl Into<String>, value: f64, unit: Unit) -> Self {
        Self::new(metric_path, vec![value], unit)
    }

    /// Hierarchical identifier, e.g. `TPU/OnBoard/CpuTemp`.
    pub fn metric_path(&self) -> &str {
        &self.metric_path
    }

    /// Measured values, in the order fixed for this metric path.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Unit of the values.
    pub fn unit(&self) -> Unit {
        self.unit
    }
}
