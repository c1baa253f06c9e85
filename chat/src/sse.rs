//! Incremental decoder for the streamed completion wire protocol.
//!
//! The response body is a byte stream of records separated by blank lines,
//! each optionally prefixed with a `data: ` field marker, each a JSON object
//! carrying `choices[0].delta.content`, terminated by a literal `[DONE]`
//! sentinel. Fragments arrive at arbitrary byte boundaries, so the decoder
//! keeps a carry-over buffer and only converts complete records to text.
//! Any byte-level split of the same logical stream yields the same ordered
//! delta sequence.

use tracing::warn;

use crate::wire::CompletionChunk;

/// Field prefix stripped from records when present.
const DATA_PREFIX: &str = "data: ";

/// Literal record body marking normal end of stream.
const SENTINEL: &str = "[DONE]";

/// Record separator on the wire.
const SEPARATOR: &[u8] = b"\n\n";

/// Decoder lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// No content seen yet.
    AwaitingData,
    /// At least one delta emitted.
    Emitting,
    /// Terminal sentinel seen or channel exhausted.
    Done,
    /// The engine marked the stream as failed mid-flight.
    Error,
}

/// Result of parsing one complete record.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParsedRecord {
    /// An incremental content delta.
    Delta(String),
    /// The literal termination sentinel.
    Sentinel,
    /// Well-formed payload with no content (role preludes, finish records).
    Empty,
    /// Payload that failed to parse; skipped, never fatal.
    Malformed,
}

/// What one `feed` call produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FeedOutcome {
    /// Content deltas decoded from complete records, in wire order.
    pub deltas: Vec<String>,

    /// Whether this call reached the terminal state. Set at most once over
    /// the decoder's lifetime.
    pub done: bool,
}

/// Reassembles records across read boundaries and extracts content deltas.
#[derive(Debug)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    state: DecoderState,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    /// Create a decoder awaiting its first fragment.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            state: DecoderState::AwaitingData,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    fn is_terminal(&self) -> bool {
        matches!(self.state, DecoderState::Done | DecoderState::Error)
    }

    /// Feed one raw fragment, returning the deltas of every record it
    /// completed. After the terminal state is reached, further input is
    /// ignored.
    pub fn feed(&mut self, bytes: &[u8]) -> FeedOutcome {
        let mut outcome = FeedOutcome::default();
        if self.is_terminal() {
            return outcome;
        }

        self.buffer.extend_from_slice(bytes);

        while let Some(pos) = self
            .buffer
            .windows(SEPARATOR.len())
            .position(|window| window == SEPARATOR)
        {
            let record_bytes: Vec<u8> = self.buffer.drain(..pos + SEPARATOR.len()).collect();
            let record = String::from_utf8_lossy(&record_bytes[..pos]);

            match parse_record(&record) {
                ParsedRecord::Sentinel => {
                    // The sentinel ends the stream; whatever follows in
                    // this read is dropped.
                    self.state = DecoderState::Done;
                    self.buffer.clear();
                    outcome.done = true;
                    return outcome;
                }
                ParsedRecord::Delta(content) => {
                    self.state = DecoderState::Emitting;
                    outcome.deltas.push(content);
                }
                ParsedRecord::Empty => {}
                ParsedRecord::Malformed => {
                    warn!("Skipping malformed stream record: {record:?}");
                }
            }
        }

        outcome
    }

    /// Treat read-channel exhaustion as an implicit terminal signal.
    ///
    /// Returns `true` only if this call moved the decoder to `Done`, so the
    /// caller observes the terminal transition exactly once whether it came
    /// from the sentinel or from exhaustion.
    pub fn finish(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = DecoderState::Done;
        true
    }

    /// Mark the stream as failed. Terminal like `Done`: later input is
    /// ignored and `finish` reports nothing.
    pub fn fail(&mut self) {
        if !self.is_terminal() {
            self.state = DecoderState::Error;
        }
    }
}

fn parse_record(record: &str) -> ParsedRecord {
    let body = record.strip_prefix(DATA_PREFIX).unwrap_or(record);

    if body.trim() == SENTINEL {
        return ParsedRecord::Sentinel;
    }

    match serde_json::from_str::<CompletionChunk>(body) {
        Ok(chunk) => {
            let content = chunk
                .choices
                .first()
                .and_then(|choice| choice.delta.content.clone());
            match content {
                Some(content) if !content.is_empty() => ParsedRecord::Delta(content),
                _ => ParsedRecord::Empty,
            }
        }
        Err(_) => ParsedRecord::Malformed,
    }
}
