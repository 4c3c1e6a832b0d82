//! Audio primitives: frame classification and WAV payload encoding.

pub mod vad;
pub mod wav;
