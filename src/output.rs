//! JSON output on stdout
//!
//! One-shot commands print a single pretty JSON document. The log stream is
//! NDJSON (newline-delimited JSON), one event per line:
//!
//! ```json
//! {"event":"record","severity":"error","component":"SpringBoard","timestamp":"2026-10-19T10:22:33","message":"...","device":"iPhone","pid":58,"pattern":"idevicesyslog","raw":"..."}
//! {"event":"closed"}
//! ```

use std::io::{self, Write};

use serde::Serialize;
use tracing::error;

/// Write `value` as one NDJSON line and flush immediately.
pub fn emit_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    out.flush()
}

/// Print `value` to stdout as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) {
    let json = match serde_json::to_string_pretty(value) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize output: {}", e);
            return;
        }
    };

    let mut stdout = io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", json) {
        error!("Failed to write output to stdout: {}", e);
    }
}
