//! Measurement source capability.

use crate::{Reading, SourceError};

/// Trait for everything the scheduler can poll.
///
/// A source owns whatever handle it measures through (a socket, a PID, a sysfs
/// path), acquired when the source is constructed and released when it is
/// dropped. The scheduler moves each source into exactly one loop, so `sample`
/// is never called concurrently on the same instance.
pub trait MeasurementSource: Send + 'static {
    /// Returns the identity the registry keys this source by.
    fn id(&self) -> &str;

    /// Performs one measurement.
    ///
    /// May return an empty vector (e.g. no GPS fix yet); that is not a failure.
    /// An `Err` terminates this source's loop.
    fn sample(&mut self) -> Result<Vec<Reading>, SourceError>;
}
