//! Multi-rate measurement scheduler.
//!
//! Every registry entry gets its own tokio task running a two-state loop:
//! `Sampling` calls the source on the blocking pool and forwards its readings,
//! `Waiting` sleeps for the entry's interval counted from when the sample
//! returned (fixed delay, not fixed rate). A failing source ends only its own
//! loop.

use crate::{EntryFailure, MeasurementSource, Reading, Registry, Sink, SourceError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Source handed back from the blocking pool along with what it produced.
type Sampled = (
    Box<dyn MeasurementSource>,
    Result<Vec<Reading>, SourceError>,
);

/// Per-entry loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Sampling,
    Waiting { until: Instant },
}

/// Shortest gap between two sink error reports from one loop.
const SINK_ERROR_LOG_WINDOW: Duration = Duration::from_secs(60);

/// Rate limiter for repeated error logs.
#[derive(Debug)]
struct ErrorThrottle {
    window: Duration,
    last_log: Option<std::time::Instant>,
    suppressed: u32,
}

impl ErrorThrottle {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last_log: None,
            suppressed: 0,
        }
    }

    /// Records one error at `now`. Returns the number of errors suppressed
    /// since the last report when this one should be logged.
    fn record(&mut self, now: std::time::Instant) -> Option<u32> {
        match self.last_log {
            Some(last) if now.duration_since(last) < self.window => {
                self.suppressed += 1;
                None
            }
            _ => {
                self.last_log = Some(now);
                Some(std::mem::take(&mut self.suppressed))
            }
        }
    }
}

/// Handle to the running measurement loops.
#[derive(Debug)]
pub struct Scheduler {
    loops: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Launches one loop per registry entry and returns immediately.
    ///
    /// Must be called from within a tokio runtime. The registry is consumed, so
    /// nothing can be registered once loops are running.
    pub fn start(registry: Registry, sink: Arc<dyn Sink>) -> Self {
        let entries = registry.into_entries();
        info!("Starting {} measurement loops", entries.len());

        let loops = entries
            .into_iter()
            .map(|entry| {
                let (source, interval) = entry.into_parts();
                tokio::spawn(run_entry(source, interval, sink.clone()))
            })
            .collect();

        Self { loops }
    }

    /// Number of launched loops.
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Returns true if no loop was launched.
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Number of loops still running.
    pub fn running(&self) -> usize {
        self.loops.iter().filter(|handle| !handle.is_finished()).count()
    }

    /// Stops every loop. A sample already in progress runs to completion but
    /// its readings are discarded.
    pub fn shutdown(self) {
        info!("Stopping {} measurement loops", self.loops.len());
        for handle in self.loops {
            handle.abort();
        }
    }
}

async fn run_entry(mut source: Box<dyn MeasurementSource>, interval: Duration, sink: Arc<dyn Sink>) {
    let source_id = source.id().to_string();
    let mut state = LoopState::Sampling;
    let mut sink_errors = ErrorThrottle::new(SINK_ERROR_LOG_WINDOW);

    debug!("{}: loop started, interval {:?}", source_id, interval);

    loop {
        state = match state {
            LoopState::Sampling => {
                let (returned, result) = match sample_blocking(source).await {
                    Ok(sampled) => sampled,
                    Err(e) if e.is_cancelled() => {
                        debug!("{}: sample cancelled, loop exiting", source_id);
                        return;
                    }
                    Err(e) => {
                        fail(&sink, &source_id, interval, SourceError::Panicked(panic_message(e)));
                        return;
                    }
                };
                let returned_at = Instant::now();
                source = returned;

                let readings = match result {
                    Ok(readings) => readings,
                    Err(error) => {
                        fail(&sink, &source_id, interval, error);
                        return;
                    }
                };

                debug!("{}: forwarding {} readings", source_id, readings.len());
                for reading in readings {
                    let Err(e) = sink.deliver(reading) else {
                        continue;
                    };
                    match sink_errors.record(std::time::Instant::now()) {
                        Some(0) => warn!("{}: sink error: {}", source_id, e),
                        Some(suppressed) => warn!(
                            "{}: sink error ({} more since last report): {}",
                            source_id, suppressed, e
                        ),
                        None => {}
                    }
                }

                LoopState::Waiting {
                    until: returned_at + interval,
                }
            }
            LoopState::Waiting { until } => {
                tokio::time::sleep_until(until).await;
                LoopState::Sampling
            }
        };
    }
}

/// Runs one `sample()` on the blocking pool, handing the source back.
async fn sample_blocking(mut source: Box<dyn MeasurementSource>) -> Result<Sampled, JoinError> {
    tokio::task::spawn_blocking(move || {
        let result = source.sample();
        (source, result)
    })
    .await
}

fn fail(sink: &Arc<dyn Sink>, source_id: &str, interval: Duration, error: SourceError) {
    let failure = EntryFailure {
        source_id: source_id.to_string(),
        interval,
        error,
    };
    warn!("Measurement loop terminated: {}", failure);
    sink.report_failure(failure);
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
