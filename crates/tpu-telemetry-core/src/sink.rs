//! Reading sinks.

use crate::{EntryFailure, Reading, SinkError};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Consumer of everything the scheduler produces.
///
/// Shared by every loop, so implementations must tolerate concurrent calls and
/// do their own serialization.
pub trait Sink: Send + Sync {
    /// Accepts one reading. Failures are logged by the caller and not retried.
    fn deliver(&self, reading: Reading) -> Result<(), SinkError>;

    /// Called once when an entry terminates because its source failed.
    fn report_failure(&self, failure: EntryFailure);
}

/// A reading stamped with the moment it reached the sink.
#[derive(Debug, Clone)]
pub struct StampedReading {
    pub reading: Reading,
    pub time: DateTime<Utc>,
}

/// Event forwarded by [`ChannelSink`].
#[derive(Debug)]
pub enum SinkEvent {
    Reading(StampedReading),
    Failure(EntryFailure),
}

/// Sink that timestamps readings and forwards them over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiving half of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Sink for ChannelSink {
    fn deliver(&self, reading: Reading) -> Result<(), SinkError> {
        let stamped = StampedReading {
            reading,
            time: Utc::now(),
        };
        self.tx
            .send(SinkEvent::Reading(stamped))
            .map_err(|_| SinkError::Closed)
    }

    fn report_failure(&self, failure: EntryFailure) {
        // Nobody left to tell if the receiver is gone.
        let _ = self.tx.send(SinkEvent::Failure(failure));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SourceError, Unit};
    use std::time::Duration;

    #[test]
    fn test_channel_sink_stamps_and_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        let before = Utc::now();
        sink.deliver(Reading::scalar("TPU/OnBoard/CpuTemp", 48.3, Unit::Celsius))
            .unwrap();

        match rx.try_recv().unwrap() {
            SinkEvent::Reading(stamped) => {
                assert_eq!(stamped.reading.metric_path(), "TPU/OnBoard/CpuTemp");
                assert!(stamped.time >= before);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_channel_sink_closed() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        let result = sink.deliver(Reading::scalar("TPU/OnBoard/CpuTemp", 48.3, Unit::Celsius));
        assert!(matches!(result, Err(SinkError::Closed)));

        // Must not panic either.
        sink.report_failure(EntryFailure {
            source_id: "cpu_temp".to_string(),
            interval: Duration::from_millis(2000),
            error: SourceError::Unavailable("gone".to_string()),
        });
    }
}
