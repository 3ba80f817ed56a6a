//! Line-oriented frame decoding for generation job streams.
//!
//! A job stream is a sequence of newline-terminated lines. Lines starting with
//! `data: ` carry one JSON event; every other line (blank separators, comments,
//! `event:` fields) is ignored. Transport deliveries are arbitrary byte slices,
//! so the decoder buffers raw bytes and only decodes a line once its `\n` has
//! arrived. UTF-8 is validated per complete line, never per delivery.

use serde::Deserialize;

/// Sentinel that marks a line as carrying an event payload.
pub const DATA_PREFIX: &str = "data: ";

// ═══════════════════════════════════════════════════════════
// Events
// ═══════════════════════════════════════════════════════════

/// One decoded event. Unrecognised `type` values become `Unknown` and extra
/// fields (`timestamp`, `success`, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status {
        #[serde(default)]
        message: String,
    },
    Content {
        chunk: String,
        #[serde(default)]
        progress: Option<String>,
    },
    Heartbeat {
        #[serde(default)]
        message: String,
    },
    Complete {
        #[serde(default)]
        generation_time: Option<String>,
        #[serde(default)]
        total_time: Option<String>,
    },
    Error {
        #[serde(default)]
        error: String,
    },
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Content { .. } => "content",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("Frame payload is not valid JSON ({source}): {preview}")]
    InvalidJson {
        preview: String,
        #[source]
        source: serde_json::Error,
    },
}

// ═══════════════════════════════════════════════════════════
// Decoder
// ═══════════════════════════════════════════════════════════

/// Incremental decoder. Feed deliveries with `push`, drain events with
/// `next_event`, and call `finish` once the transport closes.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Bytes at the front of `buffer` already handed out as lines.
    consumed: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        if self.consumed > 0 {
            self.buffer.drain(..self.consumed);
            self.consumed = 0;
        }
        self.buffer.extend_from_slice(bytes);
    }

    /// Next event from the complete lines buffered so far, or `None` when
    /// only a partial line (or nothing) remains.
    pub fn next_event(&mut self) -> Option<Result<StreamEvent, FrameError>> {
        while let Some(len) = self.buffer[self.consumed..].iter().position(|b| *b == b'\n') {
            let start = self.consumed;
            self.consumed = start + len + 1;
            if let Some(decoded) = decode_line(&self.buffer[start..start + len]).transpose() {
                return Some(decoded);
            }
        }
        None
    }

    /// Decode a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Option<Result<StreamEvent, FrameError>> {
        let buffer = std::mem::take(&mut self.buffer);
        let start = std::mem::take(&mut self.consumed);
        if buffer.len() == start {
            return None;
        }
        decode_line(&buffer[start..]).transpose()
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending_len(&self) -> usize {
        self.buffer.len() - self.consumed
    }
}

/// Decode one line (without its `\n`). `Ok(None)` for lines that carry no event.
fn decode_line(line: &[u8]) -> Result<Option<StreamEvent>, FrameError> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let Some(payload) = line.strip_prefix(DATA_PREFIX.as_bytes()) else {
        return Ok(None);
    };
    let payload = std::str::from_utf8(payload).map_err(|_| FrameError::InvalidUtf8)?;
    serde_json::from_str(payload)
        .map(Some)
        .map_err(|source| FrameError::InvalidJson {
            preview: payload.chars().take(80).collect(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &mut FrameDecoder) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = decoder.next_event() {
            events.push(event.unwrap());
        }
        events
    }

    #[test]
    fn decodes_every_event_kind() {
        let mut decoder = FrameDecoder::new();
        decoder.push(
            concat!(
                "data: {\"type\":\"status\",\"message\":\"Connecting\",\"timestamp\":\"t\"}\n\n",
                "data: {\"type\":\"content\",\"chunk\":\"# Summary\",\"progress\":\"20%\"}\n\n",
                "data: {\"type\":\"heartbeat\",\"message\":\"Processing... (10s)\"}\n\n",
                "data: {\"type\":\"complete\",\"success\":true,\"total_time\":\"5.0s\",\"generation_time\":\"4.2s\"}\n\n",
                "data: {\"type\":\"error\",\"error\":\"boom\"}\n\n",
            )
            .as_bytes(),
        );
        let events = drain(&mut decoder);
        assert_eq!(
            events,
            vec![
                StreamEvent::Status { message: "Connecting".into() },
                StreamEvent::Content {
                    chunk: "# Summary".into(),
                    progress: Some("20%".into()),
                },
                StreamEvent::Heartbeat { message: "Processing... (10s)".into() },
                StreamEvent::Complete {
                    generation_time: Some("4.2s".into()),
                    total_time: Some("5.0s".into()),
                },
                StreamEvent::Error { error: "boom".into() },
            ]
        );
    }

    #[test]
    fn frame_split_across_deliveries_yields_one_event() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {\"type\":\"content\",\"ch");
        assert!(decoder.next_event().is_none());
        assert!(decoder.pending_len() > 0);

        decoder.push(b"unk\":\"hello\"}\n\n");
        let events = drain(&mut decoder);
        assert_eq!(
            events,
            vec![StreamEvent::Content { chunk: "hello".into(), progress: None }]
        );
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn many_frames_in_one_delivery_keep_partial_tail() {
        let mut decoder = FrameDecoder::new();
        let mut delivery = String::new();
        for i in 0..50 {
            delivery.push_str(&format!("data: {{\"type\":\"content\",\"chunk\":\"{i}\"}}\n\n"));
        }
        delivery.push_str("data: {\"type\":\"comp");
        decoder.push(delivery.as_bytes());

        let events = drain(&mut decoder);
        assert_eq!(events.len(), 50);
        assert_eq!(
            events[49],
            StreamEvent::Content { chunk: "49".into(), progress: None }
        );
        assert_eq!(decoder.pending_len(), "data: {\"type\":\"comp".len());

        decoder.push(b"lete\"}\n");
        assert_eq!(
            drain(&mut decoder),
            vec![StreamEvent::Complete { generation_time: None, total_time: None }]
        );
        assert_eq!(decoder.pending_len(), 0);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn multibyte_character_split_across_deliveries() {
        let frame = "data: {\"type\":\"content\",\"chunk\":\"caf\u{e9} \u{1f6a8}\"}\n";
        let bytes = frame.as_bytes();
        // Split inside the two-byte é.
        let split = frame.find('\u{e9}').unwrap() + 1;

        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes[..split]);
        assert!(decoder.next_event().is_none());
        decoder.push(&bytes[split..]);

        let events = drain(&mut decoder);
        assert_eq!(
            events,
            vec![StreamEvent::Content {
                chunk: "caf\u{e9} \u{1f6a8}".into(),
                progress: None,
            }]
        );
    }

    #[test]
    fn byte_at_a_time_delivery() {
        let frame = b"data: {\"type\":\"status\",\"message\":\"ok\"}\r\n\r\n";
        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        for byte in frame {
            decoder.push(std::slice::from_ref(byte));
            events.extend(drain(&mut decoder));
        }
        assert_eq!(events, vec![StreamEvent::Status { message: "ok".into() }]);
    }

    #[test]
    fn non_data_lines_ignored() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b": keep-alive\nevent: message\nid: 7\n\ndata:{\"type\":\"status\"}\n");
        assert!(drain(&mut decoder).is_empty());
    }

    #[test]
    fn unknown_type_is_tolerated() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {\"type\":\"ticket_created\",\"id\":42}\n");
        assert_eq!(drain(&mut decoder), vec![StreamEvent::Unknown]);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {\"type\":\"content\",\"chunk\":\n");
        let err = decoder.next_event().unwrap().unwrap_err();
        assert!(matches!(err, FrameError::InvalidJson { .. }));
    }

    #[test]
    fn content_without_chunk_is_an_error() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {\"type\":\"content\"}\n");
        assert!(decoder.next_event().unwrap().is_err());
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {\"type\":\"status\",\"message\":\"\xff\"}\n");
        assert!(matches!(
            decoder.next_event().unwrap(),
            Err(FrameError::InvalidUtf8)
        ));
    }

    #[test]
    fn decoding_continues_after_a_bad_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: nope\ndata: {\"type\":\"status\",\"message\":\"next\"}\n");
        assert!(decoder.next_event().unwrap().is_err());
        assert_eq!(
            decoder.next_event().unwrap().unwrap(),
            StreamEvent::Status { message: "next".into() }
        );
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {\"type\":\"complete\"}");
        assert!(decoder.next_event().is_none());
        assert_eq!(
            decoder.finish().unwrap().unwrap(),
            StreamEvent::Complete { generation_time: None, total_time: None }
        );
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn event_kind_names() {
        assert_eq!(StreamEvent::Unknown.kind(), "unknown");
        assert_eq!(StreamEvent::Error { error: String::new() }.kind(), "error");
    }
}
