//! Incremental decoder for `text/event-stream` chat-completion responses.
//!
//! The decoder is transport independent: it consumes any stream of byte
//! chunks, splits it into lines, classifies each line and yields the text
//! deltas found in `choices[0].delta.content`. Malformed frames are skipped,
//! a read error ends the stream early, and `[DONE]` ends it cleanly.

use crate::constants::sse::{DATA_PREFIX, DONE_SENTINEL};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

/// What a single protocol line means to the read loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// Blank line, comment, non-`data:` field or empty payload.
    Skip,
    /// The `[DONE]` sentinel.
    Done,
    /// Payload of a `data:` line, prefix stripped and trimmed.
    Payload(&'a str),
}

pub fn classify_line(line: &str) -> SseLine<'_> {
    let line = line.trim();
    if line.is_empty() {
        return SseLine::Skip;
    }
    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return SseLine::Skip;
    };
    let payload = rest.trim();
    if payload.is_empty() {
        SseLine::Skip
    } else if payload == DONE_SENTINEL {
        SseLine::Done
    } else {
        SseLine::Payload(payload)
    }
}

/// Pull `choices[0].delta.content` out of one event payload.
///
/// Returns `None` for unparseable JSON, events without choices and empty content.
pub fn extract_delta(payload: &str) -> Option<String> {
    let event: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("Skipping malformed stream event: {}", e);
            return None;
        }
    };

    event
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())
        .filter(|content| !content.is_empty())
        .map(str::to_string)
}

/// Accumulates raw bytes and hands back complete lines.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every line completed by it, without the terminator.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let mut line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Flush a trailing line that never got its newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&raw).into_owned())
    }

    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: SseLineDecoder,
    lines: VecDeque<String>,
    exhausted: bool,
}

/// Lazily decode a byte stream into text deltas, in arrival order.
///
/// The returned stream ends at `[DONE]`, at end of input, or at the first read
/// error. Lines already received before a read error are still processed; a
/// partial line is dropped.
pub fn decode_deltas<S, B, E>(body: S) -> impl Stream<Item = String>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: SseLineDecoder::new(),
        lines: VecDeque::new(),
        exhausted: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.lines.pop_front() {
                match classify_line(&line) {
                    SseLine::Skip => continue,
                    SseLine::Done => return None,
                    SseLine::Payload(payload) => match extract_delta(payload) {
                        Some(delta) => return Some((delta, state)),
                        None => continue,
                    },
                }
            }

            if state.exhausted {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let lines = state.decoder.push(chunk.as_ref());
                    state.lines.extend(lines);
                }
                Some(Err(e)) => {
                    tracing::warn!("Stream read failed, ending response early: {}", e);
                    state.exhausted = true;
                }
                None => {
                    if let Some(line) = state.decoder.finish() {
                        state.lines.push_back(line);
                    }
                    state.exhausted = true;
                }
            }
        }
    })
}

/// Runs the wrapped callback once, when dropped.
struct DoneGuard<F: FnOnce()> {
    on_done: Option<F>,
}

impl<F: FnOnce()> DoneGuard<F> {
    fn new(on_done: F) -> Self {
        Self {
            on_done: Some(on_done),
        }
    }
}

impl<F: FnOnce()> Drop for DoneGuard<F> {
    fn drop(&mut self) {
        if let Some(on_done) = self.on_done.take() {
            on_done();
        }
    }
}

/// Drive a byte stream to its end, calling `on_delta` per delta and `on_done` exactly once.
///
/// `on_done` fires however the loop exits: end of input, `[DONE]`, read error,
/// a panic in `on_delta`, or the future being dropped.
pub async fn pump_deltas<S, B, E, D, F>(body: S, mut on_delta: D, on_done: F)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    D: FnMut(&str),
    F: FnOnce(),
{
    let _done = DoneGuard::new(on_done);
    let deltas = decode_deltas(body);
    futures::pin_mut!(deltas);
    while let Some(delta) = deltas.next().await {
        on_delta(&delta);
    }
}
