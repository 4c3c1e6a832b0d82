//! Segment assembler state machine.
//!
//! Consumes classified frames for one session and produces bounded segments:
//! - mid-utterance chunks when the buffer hits the size/time limit
//! - the final segment of an utterance when the silence threshold is reached
//!
//! Trailing silence is retained in the dispatched segment so the backend
//! receives natural boundaries; silence while idle is discarded.

use crate::audio::vad::{ClassifierConfig, FrameClassifier};
use crate::defaults;
use crate::segment::types::{Segment, SessionId};
use tracing::{debug, warn};

/// Configuration for segment boundary policies.
#[derive(Debug, Clone, Copy)]
pub struct AssemblerConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frame duration in milliseconds.
    pub frame_duration_ms: u32,
    /// Consecutive silence before the utterance is flushed (milliseconds,
    /// counted in whole frames).
    pub silence_threshold_ms: u32,
    /// Maximum chunk duration before a mid-utterance flush. Zero disables.
    pub chunk_duration_ms: u32,
    /// Maximum chunk size in bytes before a mid-utterance flush. Zero disables.
    pub chunk_size_bytes: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            frame_duration_ms: defaults::FRAME_DURATION_MS,
            silence_threshold_ms: defaults::SILENCE_THRESHOLD_MS,
            chunk_duration_ms: defaults::CHUNK_DURATION_MS,
            chunk_size_bytes: 0,
        }
    }
}

impl AssemblerConfig {
    /// Expected frame size in bytes.
    pub fn frame_size(&self) -> usize {
        defaults::frame_size_bytes(self.sample_rate, self.frame_duration_ms)
    }

    /// Silence threshold in whole frames.
    pub fn silence_threshold_frames(&self) -> u32 {
        (self.silence_threshold_ms / self.frame_duration_ms).max(1)
    }

    /// Effective chunk limit in bytes: whichever of the two criteria is
    /// smaller once the duration is converted to bytes.
    pub fn max_chunk_bytes(&self) -> usize {
        let bytes_per_ms = self.sample_rate as usize * 2 / 1000;
        let by_duration = if self.chunk_duration_ms == 0 {
            usize::MAX
        } else {
            self.chunk_duration_ms as usize * bytes_per_ms
        };
        let by_size = if self.chunk_size_bytes == 0 {
            usize::MAX
        } else {
            self.chunk_size_bytes
        };
        by_duration.min(by_size)
    }
}

/// State of the assembler for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// No speech buffered; non-speech frames are discarded.
    Idle,
    /// Speech is being accumulated.
    Speaking,
}

/// Per-session state machine turning classified frames into segments.
pub struct SegmentAssembler {
    session_id: SessionId,
    config: AssemblerConfig,
    classifier: FrameClassifier,
    state: AssemblerState,
    buffer: Vec<u8>,
    /// Consecutive non-speech frames while speaking.
    silence_frames: u32,
    /// Next sequence number to assign to an emitted segment.
    next_sequence: u64,
}

impl SegmentAssembler {
    /// Creates an assembler for one session.
    pub fn new(session_id: SessionId, config: AssemblerConfig, speech_threshold: f32) -> Self {
        let classifier = FrameClassifier::new(ClassifierConfig {
            sample_rate: config.sample_rate,
            frame_duration_ms: config.frame_duration_ms,
            speech_threshold,
        });
        Self {
            session_id,
            config,
            classifier,
            state: AssemblerState::Idle,
            buffer: Vec::new(),
            silence_frames: 0,
            next_sequence: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Bytes currently buffered.
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Sequence number the next emitted segment will carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Processes one raw frame and returns a segment if a boundary was hit.
    ///
    /// Classification failure is logged and treated as non-speech; the
    /// malformed bytes are not buffered. Both boundary policies are
    /// evaluated after every frame: the chunk limit first (stays
    /// `Speaking`), then the silence threshold (returns to `Idle`).
    pub fn push_frame(&mut self, frame: &[u8]) -> Option<Segment> {
        let (is_speech, store) = match self.classifier.classify(frame) {
            Ok(speech) => (speech, true),
            Err(e) => {
                warn!(
                    session = %self.session_id,
                    error = %e,
                    "frame classification failed, treating as non-speech"
                );
                (false, false)
            }
        };

        match (self.state, is_speech) {
            (AssemblerState::Idle, true) => {
                debug!(session = %self.session_id, "speech started");
                self.state = AssemblerState::Speaking;
                self.buffer.extend_from_slice(frame);
                self.silence_frames = 0;
            }
            (AssemblerState::Idle, false) => {
                // Idle silence is discarded.
                return None;
            }
            (AssemblerState::Speaking, true) => {
                if store {
                    self.buffer.extend_from_slice(frame);
                }
                self.silence_frames = 0;
            }
            (AssemblerState::Speaking, false) => {
                // Trailing silence is retained in the segment.
                if store {
                    self.buffer.extend_from_slice(frame);
                }
                self.silence_frames += 1;
            }
        }

        // Boundary policy 1: size/time-boxed chunk flush, state stays Speaking.
        if self.buffer.len() >= self.config.max_chunk_bytes() {
            debug!(
                session = %self.session_id,
                bytes = self.buffer.len(),
                "chunk limit reached, cutting segment"
            );
            return self.emit(false);
        }

        // Boundary policy 2: end of utterance, back to Idle.
        if self.silence_frames >= self.config.silence_threshold_frames() {
            debug!(session = %self.session_id, "silence threshold reached, flushing utterance");
            let segment = self.emit(true);
            self.to_idle();
            return segment;
        }

        None
    }

    /// Flushes whatever is buffered (teardown or end-of-stream) and returns
    /// to `Idle`. Emits only if at least one full frame is buffered.
    pub fn flush(&mut self) -> Option<Segment> {
        let segment = self.emit(true);
        self.to_idle();
        segment
    }

    /// Discards the buffer without dispatching and returns to `Idle`.
    ///
    /// Sequence numbering continues from where it was; nothing was emitted,
    /// so no gap appears.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.to_idle();
    }

    /// Cuts the current buffer into a segment, if it holds at least one
    /// full frame. Segments below one frame are never dispatched.
    fn emit(&mut self, is_final: bool) -> Option<Segment> {
        if self.buffer.len() < self.config.frame_size() {
            self.buffer.clear();
            return None;
        }

        let segment = Segment {
            session_id: self.session_id,
            sequence: self.next_sequence,
            pcm: std::mem::take(&mut self.buffer),
            is_final,
        };
        self.next_sequence += 1;
        Some(segment)
    }

    fn to_idle(&mut self) {
        self.state = AssemblerState::Idle;
        self.silence_frames = 0;
    }
}
