//! Data types that flow through the segmentation and dispatch pipeline.

use std::fmt;

/// Identifier for a connected producer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A bounded run of buffered speech (plus trailing silence) dispatched as one
/// transcription request.
///
/// Immutable once handed to the gateway. Sequence numbers are per-session,
/// strictly increasing and gapless; skipped segments are never numbered.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Owning session.
    pub session_id: SessionId,
    /// Position of this segment within the session.
    pub sequence: u64,
    /// Raw 16-bit LE mono PCM bytes.
    pub pcm: Vec<u8>,
    /// True when this segment ends an utterance (silence flush or teardown),
    /// false for a mid-utterance chunk cut by the size/time policy.
    pub is_final: bool,
}

impl Segment {
    /// Returns the duration of this segment in milliseconds.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        ((self.pcm.len() / 2) as u32 * 1000) / sample_rate
    }
}

/// Result of transcribing one segment.
#[derive(Debug, Clone)]
pub struct TranscriptResult {
    pub session_id: SessionId,
    pub sequence: u64,
    /// Transcribed text; empty when `error` is set.
    pub text: String,
    /// Backend failure description, if the request did not succeed.
    pub error: Option<String>,
}

impl TranscriptResult {
    /// Builds a successful result for a segment.
    pub fn ok(session_id: SessionId, sequence: u64, text: String) -> Self {
        Self {
            session_id,
            sequence,
            text,
            error: None,
        }
    }

    /// Builds a failed result for a segment; the text is always empty.
    pub fn failed(session_id: SessionId, sequence: u64, error: String) -> Self {
        Self {
            session_id,
            sequence,
            text: String::new(),
            error: Some(error),
        }
    }

    /// Returns true if the backend call failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
