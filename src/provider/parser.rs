//! Incremental JSON parser for streaming provider responses
//!
//! Provider streams arrive as arbitrary byte chunks carrying one JSON object
//! per event. A single-pass bracket-matching scan (string- and escape-aware)
//! extracts each complete object as soon as its closing brace arrives, so no
//! fragment is buffered longer than necessary.

use crate::errors::{EngineError, Result};

/// Maximum accumulation buffer size (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// Incremental JSON object extractor
#[derive(Debug)]
pub struct JsonParser {
    buffer: Vec<u8>,
    max_buffer_size: usize,
}

impl JsonParser {
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_buffer_size,
        }
    }

    /// Append bytes and return every complete JSON object now available,
    /// in stream order.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        if self.buffer.len() + bytes.len() > self.max_buffer_size {
            return Err(EngineError::JsonParse(format!(
                "Buffer overflow: {} bytes exceeds maximum {}",
                self.buffer.len() + bytes.len(),
                self.max_buffer_size
            )));
        }

        self.buffer.extend_from_slice(bytes);

        let mut objects = Vec::new();
        while let Some((start, end)) = self.find_complete_object() {
            let json = String::from_utf8_lossy(&self.buffer[start..=end]).to_string();
            self.buffer.drain(..=end);
            objects.push(json);
        }

        Ok(objects)
    }

    /// Find the first complete top-level JSON object in the buffer.
    ///
    /// Braces inside string literals do not count toward depth; backslash
    /// escapes inside strings are skipped.
    fn find_complete_object(&self) -> Option<(usize, usize)> {
        let mut depth = 0usize;
        let mut start = None;
        let mut in_string = false;
        let mut escaped = false;

        for (i, &byte) in self.buffer.iter().enumerate() {
            if escaped {
                escaped = false;
                continue;
            }

            match byte {
                b'\\' if in_string => escaped = true,
                b'"' => in_string = !in_string,
                b'{' if !in_string => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                b'}' if !in_string => {
                    if depth > 0 {
                        depth -= 1;
                        if depth == 0 {
                            if let Some(s) = start {
                                return Some((s, i));
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        None
    }

    /// Bytes currently buffered without a complete object
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial data (stream ended mid-object)
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}
