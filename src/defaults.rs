//! Default configuration constants for speechgate.
//!
//! Shared across configuration types so tuning values live in one place.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and what the transcription
/// backend expects in the WAV header.
pub const SAMPLE_RATE: u32 = 16_000;

/// Number of audio channels. The pipeline is mono end to end.
pub const CHANNELS: u16 = 1;

/// Bits per sample. Frames are 16-bit linear PCM, little endian.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Default frame duration in milliseconds.
///
/// 30ms at 16kHz mono/16-bit is 960 bytes per frame. Producers are expected
/// to send one frame per message; shorter frames are zero-padded for
/// classification only.
pub const FRAME_DURATION_MS: u32 = 30;

/// Default Voice Activity Detection (VAD) threshold.
///
/// RMS-based threshold (0.0 to 1.0) above which a frame counts as speech.
/// 0.02 is tuned for typical microphone input levels.
pub const VAD_THRESHOLD: f32 = 0.02;

/// Default silence duration in milliseconds before an utterance is considered
/// ended and the buffered segment is dispatched.
///
/// 1000ms allows for natural pauses without splitting an utterance; the
/// silence itself is retained in the dispatched segment.
pub const SILENCE_THRESHOLD_MS: u32 = 1000;

/// Default maximum chunk duration in milliseconds.
///
/// Long continuous speech is cut into chunks of at most this duration so the
/// producer sees progressive transcripts instead of waiting for a pause.
pub const CHUNK_DURATION_MS: u32 = 3000;

/// Default backend request timeout in milliseconds.
///
/// A request that exceeds this resolves to an error result; it never leaks
/// as an unresolved call.
pub const BACKEND_TIMEOUT_MS: u64 = 10_000;

/// Default producer-facing WebSocket listen address.
pub const LISTEN_ADDR: &str = "127.0.0.1:8765";

/// Per-session dispatch queue depth.
///
/// Bounds how many completed segments may be waiting on the backend before
/// frame ingestion applies backpressure to that session alone.
pub const DISPATCH_QUEUE_DEPTH: usize = 8;

/// Returns the expected frame size in bytes for a sample rate and duration.
pub const fn frame_size_bytes(sample_rate: u32, frame_duration_ms: u32) -> usize {
    (sample_rate as usize * frame_duration_ms as usize / 1000) * (BITS_PER_SAMPLE as usize / 8)
}
