//! Live device log streaming
//!
//! A [`SyslogSession`] owns a long-running log process (normally
//! `idevicesyslog -u <udid>`). A dedicated reader task pulls raw chunks from
//! its stdout, reassembles lines with a [`LineBuffer`], classifies them and
//! publishes [`SessionEvent`]s on the channel handed to [`SyslogSession::spawn`].
//!
//! The task is the only owner of the child process and the line buffer;
//! the session handle talks to it through a cancel channel, an atomic
//! closing flag and a `watch` channel carrying the [`SessionState`].

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use idevkit_core::prelude::*;
use idevkit_core::{SessionEvent, SessionState};

use crate::classifier::LogClassifier;
use crate::command::{spawn_error, CommandSpec};
use crate::line_buffer::LineBuffer;

/// Read size for a single stdout chunk
const CHUNK_SIZE: usize = 8 * 1024;

/// Handle to a running log stream.
///
/// Dropping the handle cancels the stream and kills the process.
pub struct SyslogSession {
    program: String,
    pid: Option<u32>,
    /// Tells the reader task to stop. Consumed on first close (or on drop).
    cancel_tx: Option<oneshot::Sender<()>>,
    /// Set before cancelling so the reader stops publishing records even for
    /// lines it already holds.
    closing: Arc<AtomicBool>,
    state_rx: watch::Receiver<SessionState>,
    task: Option<JoinHandle<()>>,
}

impl SyslogSession {
    /// Spawn the log process described by `spec` and start streaming.
    ///
    /// Returns immediately. Records and the final `Closed` notification are
    /// sent on `event_tx`. The only error is [`Error::SpawnFailed`]; after a
    /// successful start every failure degrades to a clean `Closed`.
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        spec: &CommandSpec,
        classifier: LogClassifier,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self> {
        let (state_tx, state_rx) = watch::channel(SessionState::Starting);

        info!("Starting log stream: {}", spec);

        let spawned = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                state_tx.send_replace(SessionState::Closed);
                let err = spawn_error(&spec.program, e);
                error!("Log stream failed to start: {}", err);
                return Err(err);
            }
        };

        let pid = child.id();
        info!("{} started with PID: {:?}", spec.program, pid);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::spawn_failed(&spec.program, "stdout was not captured"))?;

        let closing = Arc::new(AtomicBool::new(false));
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        state_tx.send_replace(SessionState::Streaming);

        let task = tokio::spawn(Self::pump(
            child,
            stdout,
            classifier,
            event_tx,
            cancel_rx,
            Arc::clone(&closing),
            state_tx,
        ));

        Ok(Self {
            program: spec.program.clone(),
            pid,
            cancel_tx: Some(cancel_tx),
            closing,
            state_rx,
            task: Some(task),
        })
    }

    /// Background task: owns `child` and the line buffer.
    ///
    /// Two ways the loop can end:
    /// 1. stdout reaches EOF (or fails): the buffered tail is flushed.
    /// 2. `cancel_rx` fires or its sender is dropped: nothing more is published.
    ///
    /// Either way exactly one `Closed` event is sent and the child is released.
    async fn pump(
        mut child: Child,
        mut stdout: ChildStdout,
        classifier: LogClassifier,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
        mut cancel_rx: oneshot::Receiver<()>,
        closing: Arc<AtomicBool>,
        state_tx: watch::Sender<SessionState>,
    ) {
        let mut buffer = LineBuffer::new();
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let publisher = Publisher {
            classifier: &classifier,
            event_tx: &event_tx,
            closing: &*closing,
        };

        loop {
            tokio::select! {
                biased;

                _ = &mut cancel_rx => {
                    debug!("Log stream cancelled with {} bytes pending", buffer.pending_len());
                    break;
                }

                read = stdout.read(&mut chunk) => {
                    let finished = !matches!(read, Ok(n) if n > 0);
                    let lines = match read {
                        Ok(0) => {
                            debug!("Log stream reached end of output");
                            buffer.finish().into_iter().collect()
                        }
                        Ok(n) => buffer.feed(&chunk[..n]),
                        Err(e) => {
                            // A broken pipe mid-stream ends the session like EOF
                            warn!("Log stream read failed: {}", e);
                            buffer.finish().into_iter().collect()
                        }
                    };

                    if !publisher.publish(lines) || finished {
                        break;
                    }
                }
            }
        }

        state_tx.send_replace(SessionState::Closing);
        let _ = event_tx.send(SessionEvent::Closed);

        release(&mut child).await;
        state_tx.send_replace(SessionState::Closed);
        info!("Log stream closed");
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.state().is_terminal()
    }

    /// PID of the log process
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Stop streaming and release the process.
    ///
    /// No record is published once this is called. Returns after the
    /// process has been terminated and the session is `Closed`. Calling it
    /// again, or after the stream ended on its own, is a no-op.
    pub async fn close(&mut self) {
        self.closing.store(true, Ordering::Release);

        if let Some(tx) = self.cancel_tx.take() {
            info!("Closing log stream from {}", self.program);
            // The task may have already finished on its own
            let _ = tx.send(());
        }

        self.join().await;
    }

    /// Wait for the stream to end on its own, without cancelling it.
    pub async fn wait_closed(&mut self) {
        self.join().await;
    }

    async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Log stream task failed: {}", e);
            }
        }
    }
}

impl Drop for SyslogSession {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!("SyslogSession dropped while still streaming");
            self.closing.store(true, Ordering::Release);
            // If cancel_tx was already consumed by close(), this is a no-op.
            if let Some(tx) = self.cancel_tx.take() {
                let _ = tx.send(());
            }
        }
        // The task keeps running until it has killed the child;
        // kill_on_drop(true) is the final safety net.
    }
}

/// Classifies lines and forwards records unless the session is closing.
struct Publisher<'a> {
    classifier: &'a LogClassifier,
    event_tx: &'a mpsc::UnboundedSender<SessionEvent>,
    closing: &'a AtomicBool,
}

impl Publisher<'_> {
    /// Returns `false` once publishing must stop.
    fn publish(&self, lines: Vec<String>) -> bool {
        for line in lines {
            if self.closing.load(Ordering::Acquire) {
                return false;
            }
            trace!("syslog: {}", line);

            let Some(record) = self.classifier.classify(&line) else {
                continue;
            };
            if self.event_tx.send(SessionEvent::Record(record)).is_err() {
                debug!("Session event channel closed");
                return false;
            }
        }
        !self.closing.load(Ordering::Acquire)
    }
}

/// Terminate the child if it is still running, then reap it.
async fn release(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(status)) => debug!("Log process already exited: {:?}", status),
        Ok(None) => {
            debug!("Killing log process");
            if let Err(e) = child.kill().await {
                error!("Failed to kill log process: {}", e);
            }
        }
        Err(e) => error!("Error checking log process status: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const ONE: &str = "Oct 19 10:22:33 iPhone SpringBoard[58] <Notice>: one";
    const TWO: &str = "Oct 19 10:22:34 iPhone backboardd[63] <Error>: two";

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").args(["-c", script])
    }

    /// Collect events until `Closed` (inclusive) or the channel ends.
    async fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        loop {
            match timeout(Duration::from_secs(10), rx.recv()).await {
                Ok(Some(event)) => {
                    let closed = event.is_closed();
                    events.push(event);
                    if closed {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => panic!("timed out waiting for session events"),
            }
        }
        events
    }

    fn messages(events: &[SessionEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Record(r) => Some(r.message.clone()),
                SessionEvent::Closed => None,
            })
            .collect()
    }

    fn process_alive(pid: u32) -> bool {
        std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_records_then_closed_on_natural_end() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        // Second record has no trailing newline: flushed at end of stream
        let script = format!("printf '{}\\nnot a log line\\n{}'", ONE, TWO);
        let mut session = SyslogSession::spawn(&sh(&script), LogClassifier::builtin(), tx).unwrap();

        let events = drain(&mut rx).await;
        assert_eq!(messages(&events), vec!["one", "two"]);
        assert_eq!(events.last(), Some(&SessionEvent::Closed));

        session.wait_closed().await;
        assert_eq!(session.state(), SessionState::Closed);
        // Nothing after Closed; the sender is gone once the task ends
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_before_data_emits_only_closed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = SyslogSession::spawn(&sh("exec sleep 30"), LogClassifier::builtin(), tx).unwrap();
        assert_eq!(session.state(), SessionState::Streaming);
        let pid = session.id().unwrap();

        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!process_alive(pid), "log process {} still alive after close", pid);

        let events = drain(&mut rx).await;
        assert_eq!(events, vec![SessionEvent::Closed]);

        // Second close is a no-op
        session.close().await;
        assert!(session.is_closed());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_line_split_across_chunks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let script = "printf 'Oct 19 10:22:33 iPhone a[1] <No'; sleep 0.2; printf 'tice>: joined\\n'";
        let _session = SyslogSession::spawn(&sh(script), LogClassifier::builtin(), tx).unwrap();

        let events = drain(&mut rx).await;
        assert_eq!(messages(&events), vec!["joined"]);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let spec = CommandSpec::new("idevkit-no-such-syslog-tool");
        let result = SyslogSession::spawn(&spec, LogClassifier::builtin(), tx);
        assert!(matches!(result, Err(Error::SpawnFailed { .. })));
    }

    #[tokio::test]
    async fn test_crash_mid_stream_closes_cleanly() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let script = format!("printf '{}\\n'; kill -9 $$", ONE);
        let _session = SyslogSession::spawn(&sh(&script), LogClassifier::builtin(), tx).unwrap();

        let events = drain(&mut rx).await;
        assert_eq!(messages(&events), vec!["one"]);
        assert_eq!(events.last(), Some(&SessionEvent::Closed));
    }

    #[tokio::test]
    async fn test_no_records_after_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let script = format!("while true; do echo '{}'; done", ONE);
        let mut session = SyslogSession::spawn(&sh(&script), LogClassifier::builtin(), tx).unwrap();

        // Let some records through first
        let first = timeout(Duration::from_secs(10), rx.recv()).await.unwrap();
        assert!(matches!(first, Some(SessionEvent::Record(_))));

        session.close().await;

        let rest = drain(&mut rx).await;
        assert_eq!(rest.last(), Some(&SessionEvent::Closed));
        assert_eq!(rest.iter().filter(|e| e.is_closed()).count(), 1);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_after_natural_end_is_noop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = SyslogSession::spawn(&sh("true"), LogClassifier::builtin(), tx).unwrap();

        let events = drain(&mut rx).await;
        assert_eq!(events, vec![SessionEvent::Closed]);

        session.close().await;
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_drop_kills_process() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = SyslogSession::spawn(&sh("exec sleep 30"), LogClassifier::builtin(), tx).unwrap();
        let pid = session.id().unwrap();
        drop(session);

        let events = drain(&mut rx).await;
        assert_eq!(events, vec![SessionEvent::Closed]);

        // The task reaps the child right after sending Closed
        let mut gone = false;
        for _ in 0..50 {
            if !process_alive(pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(gone, "log process {} survived dropping the session", pid);
    }
}
