//! # idevkit-core - Core Domain Types
//!
//! Foundation crate for idevkit. Provides domain types, error handling,
//! session event definitions, serial validation and option merging.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, regex, tracing).
//!
//! ## Public API
//!
//! ### Serials (`serial`)
//! - [`DeviceSerial`] - Validated device identifier (UDID)
//! - [`is_valid_serial()`] - Shape check for both UDID formats
//!
//! ### Domain Types (`types`)
//! - [`LogRecord`] - A classified device log line
//! - [`LogLevel`] - Log severity (Debug through Fault)
//!
//! ### Events (`events`)
//! - [`SessionEvent`] - `Record` / `Closed` notifications of a streaming session
//! - [`SessionState`] - Streaming session lifecycle
//!
//! ### Options (`options`)
//! - [`OptionSet`] - Option name → value mapping
//! - [`resolve()`] - Deep merge of caller overrides over defaults
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use idevkit_core::prelude::*;
//! ```

pub mod error;
pub mod events;
pub mod logging;
pub mod options;
pub mod prelude;
pub mod serial;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use events::{SessionEvent, SessionState};
pub use options::{resolve, OptionSet};
pub use serial::{is_valid_serial, DeviceSerial};
pub use types::{LogLevel, LogRecord};
