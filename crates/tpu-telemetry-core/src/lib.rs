//! TPU Telemetry Core
//!
//! Measurement scheduling engine for the TPU telemetry agent: a registry of
//! measurement sources, each polled on its own interval by an independent loop,
//! and the uniform [`Reading`] model every source produces.

pub mod error;
pub mod reading;
pub mod registry;
pub mod scheduler;
pub mod sink;
pub mod source;

pub use error::{EntryFailure, Error, Result, SinkError, SourceError};
pub use reading::{Reading, Unit};
pub use registry::{Entry, Registry};
pub use scheduler::Scheduler;
pub use sink::{ChannelSink, Sink, SinkEvent, StampedReading};
pub use source::MeasurementSource;
