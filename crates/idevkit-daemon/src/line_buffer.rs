//! Reassembly of text lines from arbitrarily split output chunks

/// Holds the unterminated tail of a process output stream.
///
/// Chunks may split a line anywhere, including inside a multi-byte UTF-8
/// sequence, so the tail is kept as raw bytes and only complete lines are
/// decoded.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, in order.
    ///
    /// Both `\n` and `\r\n` terminate a line; the terminator is not part of
    /// the line. Text after the last terminator stays buffered.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Flush the tail once the stream has ended.
    ///
    /// Returns the final unterminated line, if any, and leaves the buffer
    /// empty.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.pending);
        Some(decode_line(&tail))
    }

    /// Number of buffered bytes not yet emitted as a line
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
