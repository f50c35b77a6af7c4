//! # idevkit-daemon - Device Tool Process Management
//!
//! Runs the libimobiledevice command-line tools, decodes their output and
//! streams the device log.
//!
//! Depends on [`idevkit_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Command Invocation
//! - [`CommandSpec`] - Program, arguments and optional timeout
//! - [`run()`] - Run a command to completion, yielding a [`CommandOutcome`]
//!
//! ### Log Streaming
//! - [`SyslogSession`] - Live `idevicesyslog` stream with cancellation
//! - [`LineBuffer`] - Line reassembly across output chunks
//! - [`LogClassifier`], [`PatternTable`] - Regex recognition of log lines
//!
//! ### Device Operations
//! - [`DeviceClient`] - Per-device queries and actions
//! - [`decode_plist()`] - Property-list decoding
//! - [`shortcuts`] - Resolution, storage, battery and developer status
//!
//! ### Configuration
//! - [`Settings`] - Tool paths, timeouts and syslog patterns
//! - [`resolve_settings()`] - Load settings from `--config`, `IDEVKIT_CONFIG` or the default path
//! - [`ToolAvailability`] - Check which tools can be launched

pub mod classifier;
pub mod client;
pub mod command;
pub mod config;
pub mod decode;
pub mod line_buffer;
pub mod shortcuts;
pub mod syslog;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod tool_availability;

// Public API re-exports
pub use classifier::{LogClassifier, PatternRule, PatternTable};
pub use client::{DeviceClient, PackageList, PropertyOptions};
pub use command::{run, CommandOutcome, CommandSpec};
pub use config::{load_settings, load_settings_from, resolve_settings, Settings, ToolPaths};
pub use decode::{decode_plist, plist_to_json};
pub use line_buffer::LineBuffer;
pub use shortcuts::{Points, Resolution, Storage};
pub use syslog::SyslogSession;
pub use tool_availability::ToolAvailability;
