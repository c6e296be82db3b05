//! Reassembly of replies the wallet splits across several frames.

use serde_json::Value;

/// Accumulates partial frames until they form one JSON document.
///
/// There is no size limit: a peer that never completes a document grows the
/// buffer without bound.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: String,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one inbound frame.
    ///
    /// The frame is first parsed on its own. If that fails it is appended to
    /// the buffer and the buffer is parsed instead. Returns the document once
    /// one parses, clearing the buffer; returns `None` while still incomplete.
    pub fn push(&mut self, frame: &str) -> Option<Value> {
        if let Ok(value) = serde_json::from_str(frame) {
            self.buffer.clear();
            return Some(value);
        }

        self.buffer.push_str(frame);
        match serde_json::from_str(&self.buffer) {
            Ok(value) => {
                self.buffer.clear();
                Some(value)
            }
            Err(_) => None,
        }
    }

    /// Bytes held waiting for the rest of a document.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
