//! Application error types with rich context

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Caller Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid device serial: {serial:?}")]
    InvalidSerial { serial: String },

    #[error("Invalid option: {message}")]
    InvalidOption { message: String },

    // ─────────────────────────────────────────────────────────────
    // External Tool Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("{program} exited with code {code:?}: {}", stderr.trim())]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("{program} timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("Failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid log pattern {name:?}: {message}")]
    Pattern { name: String, message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn invalid_serial(serial: impl Into<String>) -> Self {
        Self::InvalidSerial {
            serial: serial.into(),
        }
    }

    pub fn invalid_option(message: impl Into<String>) -> Self {
        Self::InvalidOption {
            message: message.into(),
        }
    }

    pub fn spawn_failed(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn pattern(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pattern {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error
    ///
    /// A recoverable error leaves the device and the tooling in a usable state;
    /// retrying the same operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::CommandFailed { .. } | Error::TimedOut { .. } | Error::Decode { .. }
        )
    }

    /// Check if this error should trigger application exit
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::SpawnFailed { .. } | Error::Config { .. } | Error::ConfigNotFound { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = Error::invalid_serial("bogus");
        assert_eq!(err.to_string(), "Invalid device serial: \"bogus\"");

        let err = Error::spawn_failed("idevice_id", "No such file or directory");
        assert!(err.to_string().contains("idevice_id"));
    }

    #[test]
    fn test_command_failed_display_trims_stderr() {
        let err = Error::CommandFailed {
            program: "ideviceinfo".to_string(),
            code: Some(255),
            stdout: String::new(),
            stderr: "ERROR: No device found!\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "ideviceinfo exited with code Some(255): ERROR: No device found!"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(Error::spawn_failed("idevicesyslog", "missing").is_fatal());
        assert!(Error::config("bad toml").is_fatal());
        assert!(!Error::invalid_serial("x").is_fatal());
    }

    #[test]
    fn test_error_is_recoverable() {
        let timed_out = Error::TimedOut {
            program: "ideviceinfo".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(timed_out.is_recoverable());
        assert!(Error::decode("plist", "unexpected eof").is_recoverable());
        assert!(!Error::invalid_serial("x").is_recoverable());
    }

    #[test]
    fn test_result_ext_preserves_error() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result.context("reading config").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
