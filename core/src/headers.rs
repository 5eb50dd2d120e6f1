//! Per-call response header capture.

use std::collections::HashMap;

use crate::transport::HeaderSink;

/// Accumulates one response's header block as it arrives.
///
/// Every line is kept verbatim in the raw sequence. Lines of the form
/// `Key: Value` additionally populate two maps: one under the original-case
/// key and one under the lowercased key, so lookups can fall back to a
/// case-insensitive match. Later occurrences overwrite earlier ones. The
/// status line, the blank terminator, and headers whose value trims to
/// nothing stay raw-only.
#[derive(Debug, Default)]
pub struct HeaderCapture {
    raw: Vec<String>,
    parsed: HashMap<String, String>,
    iparsed: HashMap<String, String>,
}

impl HeaderCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tear down into (raw lines, original-case map, lowercased map).
    pub fn into_parts(self) -> (Vec<String>, HashMap<String, String>, HashMap<String, String>) {
        (self.raw, self.parsed, self.iparsed)
    }
}

impl HeaderSink for HeaderCapture {
    fn on_header_line(&mut self, line: &str) -> usize {
        self.raw.push(line.to_string());

        // A ": " at position zero would mean an empty key; treat the line
        // as unparseable, like the status line and the blank terminator.
        if let Some(idx) = line.find(": ") {
            if idx > 0 {
                let key = &line[..idx];
                let value = line[idx + 2..].trim();
                if !value.is_empty() {
                    self.parsed.insert(key.to_string(), value.to_string());
                    self.iparsed.insert(key.to_lowercase(), value.to_string());
                }
            }
        }

        line.len()
    }
}
