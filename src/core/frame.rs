//! Wire framing for the streaming endpoint
//!
//! Frames are separated by a blank line. Two shapes share the channel:
//! - `data: <JSON string>` carries one text fragment
//! - `event: <JSON {error, message}>` carries a structured error
//!
//! Lines without a recognizable label are read as data.

use crate::types::ErrorPayload;

/// One decoded frame, payload still raw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Data lines joined with `\n`
    Data(String),
    /// Value of the `event:` label
    Event(String),
}

/// Incremental frame decoder. Feed it bytes as they arrive.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Bytes before this offset hold no separator start
    scanned: usize,
}

impl FrameDecoder {
    /// Create new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every frame they complete, in order
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();
        let mut from = self.scanned;

        while let Some((end, sep_len)) = find_separator(&self.buffer, from) {
            let raw: Vec<u8> = self.buffer.drain(..end + sep_len).take(end).collect();
            if let Some(frame) = parse_frame(&String::from_utf8_lossy(&raw)) {
                frames.push(frame);
            }
            from = 0;
        }

        // a separator may straddle the next push by up to two bytes
        self.scanned = self.buffer.len().saturating_sub(2);
        frames
    }

    /// Flush an unterminated trailing frame at end of stream
    pub fn finish(&mut self) -> Option<Frame> {
        let raw = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        parse_frame(&String::from_utf8_lossy(&raw))
    }

    /// Bytes waiting for a separator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Locate the first blank line at or after `from`.
/// Returns (frame end, separator length).
fn find_separator(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i < buf.len() {
        if buf[i] == b'\n' {
            if buf.get(i + 1) == Some(&b'\n') {
                return Some((i, 2));
            }
            if buf.get(i + 1) == Some(&b'\r') && buf.get(i + 2) == Some(&b'\n') {
                return Some((i, 3));
            }
        }
        i += 1;
    }
    None
}

/// Parse the lines of one frame. Comment-only and empty frames yield None.
fn parse_frame(raw: &str) -> Option<Frame> {
    let mut event: Option<String> = None;
    let mut data: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(value) = field_value(line, "event") {
            event = Some(value.to_string());
        } else if let Some(value) = field_value(line, "data") {
            data.push(value);
        } else {
            data.push(line);
        }
    }

    match event {
        Some(value) => Some(Frame::Event(value)),
        None if !data.is_empty() => Some(Frame::Data(data.join("\n"))),
        None => None,
    }
}

/// `name:value` or `name: value`
fn field_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Encode one text fragment as a data frame
pub fn encode_data(fragment: &str) -> String {
    let json = serde_json::to_string(fragment).unwrap_or_else(|_| "\"\"".to_string());
    format!("data: {}\n\n", json)
}

/// Encode a structured error frame
pub fn encode_error(payload: &ErrorPayload) -> String {
    let json = serde_json::to_string(payload)
        .unwrap_or_else(|_| r#"{"error":true,"message":null}"#.to_string());
    format!("event: {}\n\n", json)
}
