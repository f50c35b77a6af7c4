//! Forwarding a device log session to an NDJSON writer

use std::future::Future;
use std::io::Write;

use tokio::sync::mpsc;

use idevkit_core::prelude::*;
use idevkit_core::{LogLevel, SessionEvent};
use idevkit_daemon::DeviceClient;

use crate::output::emit_line;

/// Totals for a finished stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Records written to the output
    pub written: usize,
    /// Records below the minimum level
    pub filtered: usize,
}

/// Stream the log of `serial` to `out` until the device tool exits or
/// `shutdown` resolves.
///
/// Every record at or above `min_level` becomes one NDJSON line, and the
/// stream always ends with a single `{"event":"closed"}` line.
pub async fn stream_syslog<W, F>(
    client: &DeviceClient,
    serial: &str,
    min_level: Option<LogLevel>,
    out: &mut W,
    shutdown: F,
) -> Result<StreamSummary>
where
    W: Write,
    F: Future<Output = ()>,
{
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut session = client.syslog(serial, event_tx)?;
    let mut summary = StreamSummary::default();

    tokio::pin!(shutdown);
    let mut shutting_down = false;

    loop {
        let event = tokio::select! {
            event = event_rx.recv() => event,
            _ = &mut shutdown, if !shutting_down => {
                info!("Shutdown requested, closing log stream");
                shutting_down = true;
                session.close().await;
                continue;
            }
        };

        // The session always sends `Closed` before dropping its sender
        let Some(event) = event else { break };

        if let SessionEvent::Record(record) = &event {
            if min_level.is_some_and(|min| min.is_more_severe_than(&record.severity)) {
                summary.filtered += 1;
                continue;
            }
            summary.written += 1;
        }

        let closed = event.is_closed();
        emit_line(out, &event)?;
        if closed {
            break;
        }
    }

    session.close().await;
    debug!(
        "Log stream finished: {} written, {} filtered",
        summary.written, summary.filtered
    );
    Ok(summary)
}
