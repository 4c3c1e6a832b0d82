//! Producer-facing control protocol.
//!
//! Producers stream raw PCM frames as binary WebSocket messages; text
//! messages carry JSON control envelopes in both directions, tagged by a
//! `type` field.

use crate::segment::TranscriptResult;
use serde::{Deserialize, Serialize};

/// Control messages from a producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Discard any buffered audio for this session without dispatching.
    Reset,
    /// Flush buffered audio and dispatch it as a final segment.
    EndOfStream,
    /// Liveness probe; answered with `Pong`.
    Ping,
}

/// Messages sent to a producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Transcript for one dispatched segment, in segment order.
    Transcription { sequence: u64, text: String },
    /// A segment's backend request failed; the stream continues.
    Error { sequence: u64, message: String },
    /// Reply to `Ping`.
    Pong,
}

impl ServerMessage {
    /// Serializes the message to its JSON wire form.
    pub fn to_json(&self) -> String {
        // Serialization of these enums cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<TranscriptResult> for ServerMessage {
    fn from(result: TranscriptResult) -> Self {
        match result.error {
            Some(message) => ServerMessage::Error {
                sequence: result.sequence,
                message,
            },
            None => ServerMessage::Transcription {
                sequence: result.sequence,
                text: result.text,
            },
        }
    }
}

impl ClientMessage {
    /// Parses a control message from its JSON wire form.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
