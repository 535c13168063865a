//! Registry of (source, interval) entries.

use crate::{Error, MeasurementSource, Result};
use std::time::Duration;
use tracing::debug;

/// One source paired with its polling interval.
pub struct Entry {
    source: Box<dyn MeasurementSource>,
    interval: Duration,
}

impl Entry {
    /// Returns the source's identity.
    pub fn source_id(&self) -> &str {
        self.source.id()
    }

    /// Returns the polling interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn into_parts(self) -> (Box<dyn MeasurementSource>, Duration) {
        (self.source, self.interval)
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("source", &self.source.id())
            .field("interval", &self.interval)
            .finish()
    }
}

/// Ordered set of measurement entries, keyed by source identity.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `source` polled every `interval_ms`, or replaces the existing entry
    /// with the same source id in place.
    pub fn register(&mut self, source: Box<dyn MeasurementSource>, interval_ms: u64) -> Result<()> {
        if interval_ms == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "interval for {} must be positive",
                source.id()
            )));
        }

        let entry = Entry {
            source,
            interval: Duration::from_millis(interval_ms),
        };

        match self
            .entries
            .iter_mut()
            .find(|existing| existing.source_id() == entry.source_id())
        {
            Some(existing) => {
                debug!(
                    "Replacing entry {} ({:?} -> {:?})",
                    entry.source_id(),
                    existing.interval,
                    entry.interval
                );
                *existing = entry;
            }
            None => {
                debug!("Registered {} every {:?}", entry.source_id(), entry.interval);
                self.entries.push(entry);
            }
        }

        Ok(())
    }

    /// Builder form of [`Registry::register`].
    pub fn with(mut self, source: Box<dyn MeasurementSource>, interval_ms: u64) -> Result<Self> {
        self.register(source, interval_ms)?;
        Ok(self)
    }

    /// Returns the entries in registration order.
    pub fn all_entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Reading, SourceError};

    struct Named(&'static str);

    impl MeasurementSource for Named {
        fn id(&self) -> &str {
            self.0
        }

        fn sample(&mut self) -> std::result::Result<Vec<Reading>, SourceError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut registry = Registry::new();
        let err = registry.register(Box::new(Named("cpu")), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registration_order() {
        let registry = Registry::new()
            .with(Box::new(Named("gps")), 100)
            .unwrap()
            .with(Box::new(Named("cpu_temp")), 2000)
            .unwrap()
            .with(Box::new(Named("mem")), 500)
            .unwrap();

        let ids: Vec<&str> = registry.all_entries().iter().map(Entry::source_id).collect();
        assert_eq!(ids, ["gps", "cpu_temp", "mem"]);
    }

    #[test]
    fn test_reregister_replaces() {
        let mut registry = Registry::new();
        registry.register(Box::new(Named("gps")), 100).unwrap();
        registry.register(Box::new(Named("cpu")), 50).unwrap();
        registry.register(Box::new(Named("gps")), 250).unwrap();

        assert_eq!(registry.len(), 2);
        let first = &registry.all_entries()[0];
        assert_eq!(first.source_id(), "gps");
        assert_eq!(first.interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_rejected_reregister_keeps_old_entry() {
        let mut registry = Registry::new();
        registry.register(Box::new(Named("gps")), 100).unwrap();
        assert!(registry.register(Box::new(Named("gps")), 0).is_err());
        assert_eq!(registry.all_entries()[0].interval(), Duration::from_millis(100));
    }
}
