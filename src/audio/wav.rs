//! WAV container encoding for backend payloads.
//!
//! The transcription backend is stateless per request, so every dispatched
//! segment carries a self-describing RIFF header (sample rate, channel
//! count, bit depth, payload length) ahead of the raw PCM.

use crate::defaults;
use crate::error::{Result, SpeechgateError};
use std::io::Cursor;

/// Encodes raw 16-bit LE mono PCM bytes as a complete WAV file in memory.
pub fn encode_segment(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: defaults::CHANNELS,
        sample_rate,
        bits_per_sample: defaults::BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer =
        hound::WavWriter::new(&mut cursor, spec).map_err(|e| SpeechgateError::Other(format!(
            "Failed to create WAV writer: {}",
            e
        )))?;

    for bytes in pcm.chunks_exact(2) {
        let sample = i16::from_le_bytes([bytes[0], bytes[1]]);
        writer
            .write_sample(sample)
            .map_err(|e| SpeechgateError::Other(format!("Failed to write WAV sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| SpeechgateError::Other(format!("Failed to finalize WAV payload: {}", e)))?;

    Ok(cursor.into_inner())
}
