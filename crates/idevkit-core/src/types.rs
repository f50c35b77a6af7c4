//! Core domain types for device log records

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Log severity levels
///
/// Covers both the classic ASL levels and the unified logging levels that
/// `idevicesyslog` prints in angle brackets (`<Notice>`, `<Fault>`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Fault,
}

impl LogLevel {
    /// Get display prefix for log level
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DBG",
            LogLevel::Info => "INF",
            LogLevel::Notice => "NTC",
            LogLevel::Warning => "WRN",
            LogLevel::Error => "ERR",
            LogLevel::Fault => "FLT",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Fault => "fault",
        }
    }

    /// Get numeric severity value for comparison
    /// Higher values indicate more severe levels
    pub fn severity(&self) -> u8 {
        match self {
            LogLevel::Debug => 0,
            LogLevel::Info => 1,
            LogLevel::Notice => 2,
            LogLevel::Warning => 3,
            LogLevel::Error => 4,
            LogLevel::Fault => 5,
        }
    }

    /// Compare severity levels
    /// Returns true if this level is more severe than other
    pub fn is_more_severe_than(&self, other: &LogLevel) -> bool {
        self.severity() > other.severity()
    }

    /// Map a level label as printed by the device tools.
    ///
    /// Case-insensitive. ASL names (`Emergency`, `Alert`, `Critical`) fold into
    /// [`LogLevel::Fault`]; `Default` is the unified-logging name for notice.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" | "verbose" => Some(LogLevel::Debug),
            "info" | "information" => Some(LogLevel::Info),
            "notice" | "default" => Some(LogLevel::Notice),
            "warning" | "warn" => Some(LogLevel::Warning),
            "error" | "err" => Some(LogLevel::Error),
            "fault" | "critical" | "crit" | "alert" | "emergency" | "emerg" | "fatal" => {
                Some(LogLevel::Fault)
            }
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured record extracted from one device log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub severity: LogLevel,

    /// Process or subsystem that produced the line (e.g. `SpringBoard`)
    pub component: Option<String>,

    /// Device-local timestamp. Syslog lines carry no year or zone, so the
    /// classifier fills in the current year.
    pub timestamp: Option<NaiveDateTime>,

    pub message: String,

    /// Device name as printed in the line header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Name of the pattern that recognised the line
    pub pattern: String,

    /// Extra named captures not mapped to a dedicated field
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,

    pub raw: String,
}
