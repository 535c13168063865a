//! Error types for the telemetry scheduling engine.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced synchronously to whoever assembles the agent.
#[derive(Error, Debug)]
pub enum Error {
    /// A registration was rejected before the scheduler ever saw it.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Unknown unit tag.
    #[error("Invalid unit: {0}")]
    InvalidUnit(String),
}

/// Errors a measurement source may return from a single sample.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Reading the underlying device or file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device answered with data that could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The measured resource is gone (process exited, sensor removed).
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// The sample call panicked.
    #[error("Sample panicked: {0}")]
    Panicked(String),
}

/// Errors a sink may return when handed a reading.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The consumer on the other end of the sink is gone.
    #[error("Sink closed")]
    Closed,

    /// The sink refused the reading.
    #[error("Sink rejected reading: {0}")]
    Rejected(String),
}

/// A source failure tagged with the entry it terminated.
#[derive(Debug)]
pub struct EntryFailure {
    /// Identity of the failing source.
    pub source_id: String,
    /// Polling interval of the terminated entry.
    pub interval: Duration,
    /// What went wrong.
    pub error: SourceError,
}

impl std::fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (every {}ms): {}",
            self.source_id,
            self.interval.as_millis(),
            self.error
        )
    }
}
