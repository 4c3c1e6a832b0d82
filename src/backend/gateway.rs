//! Transcription gateway.
//!
//! Owns the backend handoff for dispatched segments: encodes the PCM as
//! WAV, calls the backend with a deadline, and folds every failure mode
//! into a `TranscriptResult` so a misbehaving backend never faults the
//! session pipeline.

use crate::audio::wav;
use crate::backend::TranscriptionBackend;
use crate::defaults;
use crate::error::SpeechgateError;
use crate::segment::{Segment, TranscriptResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the gateway.
#[derive(Debug, Clone, Copy)]
pub struct GatewayConfig {
    /// Sample rate stamped into the WAV header.
    pub sample_rate: u32,
    /// Deadline for one backend request.
    pub request_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            request_timeout_ms: defaults::BACKEND_TIMEOUT_MS,
        }
    }
}

/// Dispatches segments to a transcription backend.
pub struct TranscriptionGateway<B: TranscriptionBackend> {
    backend: Arc<B>,
    config: GatewayConfig,
}

impl<B: TranscriptionBackend> TranscriptionGateway<B> {
    /// Creates a gateway over the given backend.
    pub fn new(backend: B, config: GatewayConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
        }
    }

    /// Creates a gateway over a shared backend.
    pub fn from_arc(backend: Arc<B>, config: GatewayConfig) -> Self {
        Self { backend, config }
    }

    /// Transcribes one segment.
    ///
    /// Always produces a result carrying the segment's session and
    /// sequence; encode failures, connection errors, protocol errors and
    /// timeouts come back as error results, never as faults.
    pub async fn transcribe_segment(&self, segment: &Segment) -> TranscriptResult {
        let wav = match wav::encode_segment(&segment.pcm, self.config.sample_rate) {
            Ok(wav) => wav,
            Err(e) => {
                warn!(
                    session = %segment.session_id,
                    sequence = segment.sequence,
                    error = %e,
                    "segment encode failed"
                );
                return TranscriptResult::failed(
                    segment.session_id,
                    segment.sequence,
                    e.to_string(),
                );
            }
        };

        let deadline = Duration::from_millis(self.config.request_timeout_ms);
        let outcome = tokio::time::timeout(deadline, self.backend.transcribe(&wav)).await;

        match outcome {
            Ok(Ok(text)) => {
                debug!(
                    session = %segment.session_id,
                    sequence = segment.sequence,
                    duration_ms = segment.duration_ms(self.config.sample_rate),
                    chars = text.len(),
                    "segment transcribed"
                );
                TranscriptResult::ok(segment.session_id, segment.sequence, text)
            }
            Ok(Err(e)) => {
                warn!(
                    session = %segment.session_id,
                    sequence = segment.sequence,
                    backend = self.backend.name(),
                    error = %e,
                    "backend request failed"
                );
                TranscriptResult::failed(segment.session_id, segment.sequence, e.to_string())
            }
            Err(_) => {
                let e = SpeechgateError::BackendTimeout {
                    timeout_ms: self.config.request_timeout_ms,
                };
                warn!(
                    session = %segment.session_id,
                    sequence = segment.sequence,
                    backend = self.backend.name(),
                    "backend request timed out"
                );
                TranscriptResult::failed(segment.session_id, segment.sequence, e.to_string())
            }
        }
    }
}
