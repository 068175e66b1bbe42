//! Continuous `_changes` feed decoding.
//!
//! CouchDB writes one JSON object per line. Blank lines are heartbeats. A
//! line carrying `last_seq` closes the feed.

use std::fmt::Display;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use outbox_core::error::StoreError;
use outbox_core::store::{Change, ChangeStream, Document, Revision};
use serde::Deserialize;
use serde_json::Value;

/// Longest feed line accepted, in bytes. Each line carries one full
/// document, so this also bounds the size of a document the feed can
/// deliver.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct FeedLine {
    seq: Option<Value>,
    #[serde(default)]
    deleted: bool,
    doc: Option<Value>,
    last_seq: Option<Value>,
    error: Option<String>,
    reason: Option<String>,
}

/// What one line of the feed means.
#[derive(Debug, PartialEq)]
enum Line {
    Skip,
    Change(Change),
    End,
}

/// Decodes a raw byte stream of a continuous feed into changes.
///
/// A transport error, or a line longer than [`MAX_LINE_BYTES`], is yielded
/// once and ends the stream.
pub fn decode_changes<S, B, E>(bytes: S) -> ChangeStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    decode_changes_with_limit(bytes, MAX_LINE_BYTES)
}

fn decode_changes_with_limit<S, B, E>(bytes: S, max_line: usize) -> ChangeStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = Decoder {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        max_line,
        finished: false,
    };
    Box::pin(futures::stream::unfold(state, Decoder::next))
}

struct Decoder<B, E> {
    bytes: Pin<Box<dyn Stream<Item = Result<B, E>> + Send>>,
    buffer: Vec<u8>,
    max_line: usize,
    finished: bool,
}

impl<B, E> Decoder<B, E>
where
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    async fn next(mut self) -> Option<(Result<Change, StoreError>, Self)> {
        loop {
            if let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=newline).collect();
                match parse_line(&line) {
                    Ok(Line::Skip) => continue,
                    Ok(Line::Change(change)) => return Some((Ok(change), self)),
                    Ok(Line::End) => return None,
                    Err(err) => return Some((Err(err), self)),
                }
            }
            if self.finished {
                let rest = std::mem::take(&mut self.buffer);
                return match parse_line(&rest) {
                    Ok(Line::Change(change)) => Some((Ok(change), self)),
                    Ok(Line::Skip | Line::End) => None,
                    Err(err) => Some((Err(err), self)),
                };
            }
            if self.buffer.len() > self.max_line {
                let length = self.buffer.len();
                self.finished = true;
                self.buffer.clear();
                return Some((
                    Err(StoreError::Serialization(format!(
                        "change feed line exceeds {} bytes ({length} buffered)",
                        self.max_line
                    ))),
                    self,
                ));
            }
            match self.bytes.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(err)) => {
                    self.finished = true;
                    self.buffer.clear();
                    return Some((Err(StoreError::Connection(err.to_string())), self));
                }
                None => self.finished = true,
            }
        }
    }
}

fn parse_line(raw: &[u8]) -> Result<Line, StoreError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Line::Skip);
    }
    let line: FeedLine = serde_json::from_slice(raw)?;

    if let Some(error) = line.error {
        let reason = line.reason.unwrap_or_default();
        return Err(StoreError::Request(format!("change feed error {error}: {reason}")));
    }
    if line.last_seq.is_some() {
        return Ok(Line::End);
    }
    if line.deleted {
        return Ok(Line::Skip);
    }

    let seq = match line.seq {
        Some(Value::String(seq)) => seq,
        Some(other) => other.to_string(),
        None => return Err(StoreError::Serialization("change without seq".to_owned())),
    };
    let body = line
        .doc
        .ok_or_else(|| StoreError::Serialization(format!("change {seq} without doc")))?;
    let id = body
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Serialization(format!("change {seq} without _id")))?
        .to_owned();
    let rev = body
        .get("_rev")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Serialization(format!("change {seq} without _rev")))?;

    Ok(Line::Change(Change {
        seq,
        document: Document {
            id,
            rev: Revision::from(rev),
            body,
        },
    }))
}
