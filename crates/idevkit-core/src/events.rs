//! Events published by a log streaming session

use serde::Serialize;

use crate::types::LogRecord;

/// Notifications delivered to the owner of a streaming session.
///
/// Zero or more `Record` events are followed by exactly one `Closed`;
/// nothing is delivered after `Closed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A line was recognised by the classifier
    Record(LogRecord),

    /// The session reached its terminal state (cancelled, or the process
    /// closed its output)
    Closed,
}

impl SessionEvent {
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionEvent::Closed)
    }
}

/// Lifecycle of a streaming session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Process spawn requested
    Starting,
    /// Output is being read and classified
    Streaming,
    /// Terminal notification sent; process being released
    Closing,
    /// Process released; terminal
    Closed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed)
    }
}
