//! Voice Activity Detection (VAD) frame classifier.
//!
//! Stateless per-frame speech/non-speech decision using RMS-based
//! thresholding. State machine logic over the classified frames lives in
//! `segment::assembler`.

use crate::defaults;
use crate::error::{Result, SpeechgateError};

/// Configuration for the frame classifier.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Expected frame duration in milliseconds.
    pub frame_duration_ms: u32,
    /// RMS threshold for detecting speech (0.0 to 1.0).
    pub speech_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            frame_duration_ms: defaults::FRAME_DURATION_MS,
            speech_threshold: defaults::VAD_THRESHOLD,
        }
    }
}

/// Stateless speech/non-speech classifier over fixed-size PCM frames.
///
/// The sensitivity threshold is fixed configuration, not per-call state.
#[derive(Debug, Clone)]
pub struct FrameClassifier {
    config: ClassifierConfig,
    frame_size: usize,
}

impl FrameClassifier {
    /// Creates a classifier for the configured frame format.
    pub fn new(config: ClassifierConfig) -> Self {
        let frame_size =
            defaults::frame_size_bytes(config.sample_rate, config.frame_duration_ms);
        Self { config, frame_size }
    }

    /// Expected frame size in bytes.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Classifies one frame of 16-bit LE mono PCM as speech (`true`) or
    /// non-speech (`false`).
    ///
    /// Short frames are zero-padded to the expected length before
    /// classification; overlong frames are truncated. Padding affects only
    /// the decision, never what callers buffer. Empty or odd-length input is
    /// a `Classification` error.
    pub fn classify(&self, frame: &[u8]) -> Result<bool> {
        if frame.is_empty() {
            return Err(SpeechgateError::Classification {
                message: "empty frame".to_string(),
            });
        }
        if frame.len() % 2 != 0 {
            return Err(SpeechgateError::Classification {
                message: format!("odd byte count: {}", frame.len()),
            });
        }

        let samples = self.normalized_samples(frame);
        Ok(calculate_rms(&samples) > self.config.speech_threshold)
    }

    /// Decodes the frame to samples, padded or truncated to one frame's worth.
    fn normalized_samples(&self, frame: &[u8]) -> Vec<i16> {
        let expected = self.frame_size / 2;
        let mut samples: Vec<i16> = frame
            .chunks_exact(2)
            .take(expected)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        samples.resize(expected, 0);
        samples
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// Returns a normalized value (0.0 to 1.0), where 0.0 is silence and
/// ~0.707 is a full-scale sine wave.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}
