//! idevkit Library
//!
//! Command-line front end over [`idevkit_daemon`]: argument parsing, JSON
//! output and the NDJSON device log stream.

pub mod cli;
pub mod output;
pub mod stream;

pub use cli::{run, Args};
pub use stream::{stream_syslog, StreamSummary};
