//! SSE stream decoder for chat-completion deltas.
//!
//! Incoming bytes are buffered and split on line boundaries (TCP chunks can
//! split an event anywhere), `data:` payloads are parsed as JSON, and the
//! `choices[0].delta.content` fragment of each event is surfaced. Keep-alive
//! lines, `event:` lines, and the `data: [DONE]` terminator are swallowed.

use serde_json::Value;

/// Incremental decoder turning raw SSE bytes into content deltas.
#[derive(Debug, Default)]
pub struct DeltaDecoder {
    buffer: String,
}

impl DeltaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the content fragments of every complete
    /// event they finish.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut deltas = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            if let Some(content) = Self::decode_line(&line) {
                deltas.push(content);
            }
        }
        deltas
    }

    /// Drain whatever remains in the buffer as a final (newline-less) line.
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        rest.lines().filter_map(Self::decode_line).collect()
    }

    fn decode_line(line: &str) -> Option<String> {
        let line = line.trim();
        let data = line
            .strip_prefix("data: ")
            .or_else(|| line.strip_prefix("data:"))?
            .trim();
        if data.is_empty() || data == "[DONE]" {
            return None;
        }
        let event: Value = serde_json::from_str(data).ok()?;
        let content = event
            .get("choices")?
            .get(0)?
            .get("delta")?
            .get("content")?
            .as_str()?;
        if content.is_empty() {
            None
        } else {
            Some(content.to_string())
        }
    }
}
