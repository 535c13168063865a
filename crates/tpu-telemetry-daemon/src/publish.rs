//! Publisher: drains the scheduler's sink channel.

use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tpu_telemetry_core::SinkEvent;
use tracing::{debug, info, warn};

use crate::state::{AppState, FailedEntry, Publication};

/// Consumes sink events until every sender is gone.
///
/// Each reading updates the shared state and, when `out` is set, is written to
/// it as one JSON line. Events already queued are handled as one batch and
/// `out` is flushed once the batch is written.
pub async fn publish_loop<W: AsyncWrite + Unpin>(
    mut rx: UnboundedReceiver<SinkEvent>,
    state: Arc<AppState>,
    mut out: Option<W>,
) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(event) = rx.try_recv() {
            batch.push(event);
        }

        for event in batch {
            match event {
                SinkEvent::Reading(stamped) => {
                    let publication = Publication::from(&stamped);
                    debug!("Publishing {:?}", publication);

                    if let Some(out) = out.as_mut() {
                        if let Err(e) = write_line(out, &publication).await {
                            warn!("Failed to write publication: {}", e);
                        }
                    }

                    state.record(publication);
                }
                SinkEvent::Failure(failure) => {
                    state.record_failure(FailedEntry::from(&failure));
                }
            }
        }

        if let Some(out) = out.as_mut() {
            if let Err(e) = out.flush().await {
                warn!("Failed to flush publications: {}", e);
            }
        }
    }

    info!("Publisher stopped");
}

async fn write_line<W: AsyncWrite + Unpin>(
    out: &mut W,
    publication: &Publication,
) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(publication)?;
    line.push(b'\n');
    out.write_all(&line).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tpu_telemetry_core::{ChannelSink, EntryFailure, Reading, Sink, SourceError, Unit};

    #[tokio::test]
    async fn test_publishes_json_lines_and_records_state() {
        let (sink, rx) = ChannelSink::new();
        let state = Arc::new(AppState::new());

        sink.deliver(Reading::scalar("TPU/OnBoard/CpuTemp", 47.5, Unit::Celsius))
            .unwrap();
        sink.deliver(Reading::new(
            "TPU/GPS/Location",
            vec![42.5, -71.25],
            Unit::Coordinate,
        ))
        .unwrap();
        sink.report_failure(EntryFailure {
            source_id: "broker_cpu".to_string(),
            interval: Duration::from_millis(100),
            error: SourceError::Unavailable("process 812 exited".to_string()),
        });
        drop(sink);

        let mut out = Vec::new();
        publish_loop(rx, state.clone(), Some(&mut out)).await;

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["topic"], "TPU/OnBoard/CpuTemp");
        assert_eq!(lines[0]["unit"], "celsius");
        assert_eq!(lines[0]["values"][0], 47.5);
        assert!(lines[0]["time_us"].as_i64().unwrap() > 0);
        assert_eq!(lines[1]["unit"], "coordinate");
        assert_eq!(lines[1]["values"][1], -71.25);

        assert_eq!(state.latest().len(), 2);
        let health = state.health();
        assert_eq!(health.failed.len(), 1);
        assert_eq!(health.failed[0].source, "broker_cpu");
        assert_eq!(health.failed[0].interval_ms, 100);
    }

    #[tokio::test]
    async fn test_without_output() {
        let (sink, rx) = ChannelSink::new();
        let state = Arc::new(AppState::new());
        sink.deliver(Reading::scalar("TPU/OnBoard/MemAvailable", 812.0, Unit::Megabyte))
            .unwrap();
        drop(sink);

        publish_loop::<tokio::io::Sink>(rx, state.clone(), None).await;
        assert_eq!(state.latest()[0].unit, Unit::Megabyte);
    }

    /// Records written bytes and flush calls.
    #[derive(Default)]
    struct CountingWriter {
        data: Vec<u8>,
        flushes: usize,
    }

    impl AsyncWrite for CountingWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            self.flushes += 1;
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_queued_readings_flushed_once() {
        let (sink, rx) = ChannelSink::new();
        let state = Arc::new(AppState::new());
        for i in 0..50 {
            sink.deliver(Reading::scalar("TPU/OnBoard/CpuUsage", i as f64, Unit::Percent))
                .unwrap();
        }
        drop(sink);

        let mut out = CountingWriter::default();
        publish_loop(rx, state, Some(&mut out)).await;

        let text = String::from_utf8(out.data).unwrap();
        assert_eq!(text.lines().count(), 50);
        assert_eq!(out.flushes, 1);
    }
}
