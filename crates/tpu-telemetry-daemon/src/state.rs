//! Application state shared between the publisher and the status API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use tpu_telemetry_core::{EntryFailure, StampedReading, Unit};

/// A reading as published: topic, values, unit and delivery time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Publication {
    pub topic: String,
    pub values: Vec<f64>,
    pub unit: Unit,
    pub time_us: i64,
}

impl From<&StampedReading> for Publication {
    fn from(stamped: &StampedReading) -> Self {
        Self {
            topic: stamped.reading.metric_path().to_string(),
            values: stamped.reading.values().to_vec(),
            unit: stamped.reading.unit(),
            time_us: stamped.time.timestamp_micros(),
        }
    }
}

/// A measurement loop that stopped because its source failed.
#[derive(Debug, Clone, Serialize)]
pub struct FailedEntry {
    pub source: String,
    pub interval_ms: u64,
    pub error: String,
    pub time: DateTime<Utc>,
}

impl From<&EntryFailure> for FailedEntry {
    fn from(failure: &EntryFailure) -> Self {
        Self {
            source: failure.source_id.clone(),
            interval_ms: failure.interval.as_millis() as u64,
            error: failure.error.to_string(),
            time: Utc::now(),
        }
    }
}

/// Health summary served by the status API.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub started: DateTime<Utc>,
    pub loops: usize,
    pub running: usize,
    pub failed: Vec<FailedEntry>,
}

/// Shared application state.
pub struct AppState {
    started: DateTime<Utc>,
    loops: AtomicUsize,
    latest: RwLock<BTreeMap<String, Publication>>,
    failed: RwLock<Vec<FailedEntry>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            started: Utc::now(),
            loops: AtomicUsize::new(0),
            latest: RwLock::new(BTreeMap::new()),
            failed: RwLock::new(Vec::new()),
        }
    }

    /// Records how many measurement loops were launched.
    pub fn set_loops(&self, loops: usize) {
        self.loops.store(loops, Ordering::Relaxed);
    }

    /// Replaces the latest publication for its topic.
    pub fn record(&self, publication: Publication) {
        if let Ok(mut latest) = self.latest.write() {
            latest.insert(publication.topic.clone(), publication);
        }
    }

    pub fn record_failure(&self, failure: FailedEntry) {
        if let Ok(mut failed) = self.failed.write() {
            failed.push(failure);
        }
    }

    /// Latest publication per topic, ordered by topic.
    pub fn latest(&self) -> Vec<Publication> {
        self.latest
            .read()
            .map(|latest| latest.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn health(&self) -> Health {
        let failed = self.failed.read().map(|f| f.clone()).unwrap_or_default();
        let loops = self.loops.load(Ordering::Relaxed);
        Health {
            started: self.started,
            loops,
            running: loops.saturating_sub(failed.len()),
            failed,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
