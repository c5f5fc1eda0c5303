//! Bounded capture of subprocess output
//!
//! Keeps the most recent lines within line and byte caps; older lines are
//! dropped and reported with a single omission marker.

use std::collections::VecDeque;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub const DEFAULT_MAX_LINES: usize = 2_000;
pub const DEFAULT_MAX_BYTES: usize = 256 * 1024;

#[derive(Debug)]
pub struct BoundedOutput {
    lines: VecDeque<String>,
    total_bytes: usize,
    dropped_lines: usize,
    max_lines: usize,
    max_bytes: usize,
}

impl Default for BoundedOutput {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES, DEFAULT_MAX_BYTES)
    }
}

impl BoundedOutput {
    pub fn new(max_lines: usize, max_bytes: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            total_bytes: 0,
            dropped_lines: 0,
            max_lines: max_lines.max(1),
            max_bytes: max_bytes.max(1),
        }
    }

    pub fn push_line(&mut self, line: &str) {
        let kept = tail_by_bytes(line, self.max_bytes);
        self.total_bytes = self.total_bytes.saturating_add(kept.len());
        self.lines.push_back(kept);

        while self.lines.len() > self.max_lines || self.total_bytes > self.max_bytes {
            match self.lines.pop_front() {
                Some(removed) => {
                    self.total_bytes = self.total_bytes.saturating_sub(removed.len());
                    self.dropped_lines = self.dropped_lines.saturating_add(1);
                }
                None => break,
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.dropped_lines == 0
    }

    /// Current contents without consuming the buffer
    pub fn text(&self) -> String {
        let mut out = String::new();
        if self.dropped_lines > 0 {
            out.push_str(&format!(
                "[... omitted {} earlier line(s) due to buffer limits ...]",
                self.dropped_lines
            ));
        }
        for line in &self.lines {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(line);
        }
        out
    }

    /// Last non-empty line, used as a short error summary
    pub fn last_line(&self) -> Option<&str> {
        self.lines
            .iter()
            .rev()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
    }
}

/// Newline-delimited reader that decodes each line lossily
///
/// Invalid UTF-8 is replaced rather than ending the stream, so callers can
/// keep draining a child's pipe until EOF.
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> LossyLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator; `None` at EOF
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

/// Keep the tail of a string within `max_bytes`, preserving UTF-8 boundaries
fn tail_by_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut start = text.len().saturating_sub(max_bytes);
    while start < text.len() && !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_oldest_lines_past_cap() {
        let mut buf = BoundedOutput::new(2, 1024);
        for line in ["one", "two", "three"] {
            buf.push_line(line);
        }
        assert_eq!(
            buf.text(),
            "[... omitted 1 earlier line(s) due to buffer limits ...]\ntwo\nthree"
        );
    }

    #[test]
    fn byte_cap_keeps_tail_on_char_boundary() {
        let mut buf = BoundedOutput::new(10, 4);
        buf.push_line("héllo");
        assert_eq!(buf.text(), "llo");
    }

    #[tokio::test]
    async fn lossy_lines_survive_invalid_utf8() {
        let input: &[u8] = b"before\nbad \xff byte\r\nafter";
        let mut lines = LossyLines::new(input);
        let mut seen = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            seen.push(line);
        }
        assert_eq!(seen, vec!["before", "bad \u{FFFD} byte", "after"]);
    }

    #[test]
    fn last_line_skips_blank_lines() {
        let mut buf = BoundedOutput::default();
        buf.push_line("error: bad");
        buf.push_line("   ");
        assert_eq!(buf.last_line(), Some("error: bad"));
    }
}
