//! Incremental decoding of the chat backend's streamed reply.
//!
//! The body is a sequence of lines. Lines starting with `data: ` carry a JSON
//! payload `{"type": "url" | "message", "content": ...}`. Payloads that are not
//! valid JSON are appended to the reply verbatim rather than rejected.

use futures_util::{Stream, StreamExt};
use log::{debug, warn};
use serde_json::Value;

use crate::message::Message;

pub const DATA_PREFIX: &str = "data: ";

/// One decoded line of the response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Link to an interactive 3D resource for the current reply.
    Url(String),
    /// Next piece of the reply text.
    Message(String),
    /// A data line whose payload could not be parsed.
    Raw(String),
    /// A well-formed payload with an unknown type, or an empty data line.
    Ignored,
}

/// Parses a single line. Returns `None` for lines that are not data frames.
pub fn parse_line(line: &str) -> Option<Frame> {
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();

    let value: Value = match serde_json::from_str(payload) {
        // A null frame has no fields to read, so it is kept as text
        Ok(Value::Null) => {
            warn!("Null data frame");
            return Some(Frame::Raw(payload.to_string()));
        }
        Ok(value) => value,
        Err(_) if payload.is_empty() => return Some(Frame::Ignored),
        Err(e) => {
            warn!("Malformed data frame ({}): {:?}", e, payload);
            return Some(Frame::Raw(payload.to_string()));
        }
    };

    let content = match value.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let frame = match value.get("type").and_then(Value::as_str) {
        Some("url") => Frame::Url(content),
        Some("message") => Frame::Message(content),
        other => {
            debug!("Ignoring data frame of type {:?}", other);
            Frame::Ignored
        }
    };
    Some(frame)
}

/// Splits a byte stream into complete text lines.
///
/// Chunk boundaries may fall anywhere, including inside a line or a UTF-8
/// sequence. Bytes are held back until their terminating `\n` arrives.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Flushes an unterminated final line at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.pending);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// A change to apply to the in-progress reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// The full reply text received so far.
    Content(String),
    ResourceUrl(String),
}

impl StreamUpdate {
    pub fn apply(&self, message: &mut Message) {
        match self {
            StreamUpdate::Content(text) => {
                message.content.clear();
                message.content.push_str(text);
            }
            StreamUpdate::ResourceUrl(url) => {
                message.resource_url = Some(url.clone());
            }
        }
    }
}

/// Accumulates a streamed reply and reports each change to it.
#[derive(Debug, Default)]
pub struct StreamIngestor {
    decoder: LineDecoder,
    buffer: String,
}

impl StreamIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply text accumulated so far.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamUpdate> {
        let lines = self.decoder.feed(chunk);
        lines.iter().filter_map(|line| self.apply_line(line)).collect()
    }

    pub fn finish(&mut self) -> Vec<StreamUpdate> {
        match self.decoder.finish() {
            Some(line) => self.apply_line(&line).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn apply_line(&mut self, line: &str) -> Option<StreamUpdate> {
        match parse_line(line)? {
            Frame::Url(url) => Some(StreamUpdate::ResourceUrl(url)),
            Frame::Message(text) | Frame::Raw(text) => {
                self.buffer.push_str(&text);
                Some(StreamUpdate::Content(self.buffer.clone()))
            }
            Frame::Ignored => None,
        }
    }
}

/// Reads `stream` to completion, reporting every update to `on_update`.
///
/// Returns the final reply text. The first transport error ends ingestion.
pub async fn ingest<S, B, E, F>(stream: S, mut on_update: F) -> Result<String, E>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    F: FnMut(StreamUpdate),
{
    let mut ingestor = StreamIngestor::new();
    let mut stream = std::pin::pin!(stream);

    while let Some(chunk) = stream.next().await {
        for update in ingestor.feed(chunk?.as_ref()) {
            on_update(update);
        }
    }
    for update in ingestor.finish() {
        on_update(update);
    }

    Ok(ingestor.buffer)
}
