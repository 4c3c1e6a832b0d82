//! Speech segmentation: per-session state machine and segment types.

pub mod assembler;
pub mod types;

pub use assembler::{AssemblerConfig, AssemblerState, SegmentAssembler};
pub use types::{Segment, SessionId, TranscriptResult};
