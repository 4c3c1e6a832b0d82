//! speechgate - voice-activity-gated speech segmentation and dispatch
//!
//! Accepts raw PCM frame streams from producers over WebSocket, gates them
//! with per-frame voice activity detection, assembles bounded speech
//! segments, and dispatches each segment to a transcription backend.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod backend;
pub mod config;
pub mod defaults;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod segment;
pub mod server;

// Pipeline stages
pub use audio::vad::{ClassifierConfig, FrameClassifier};
pub use segment::{AssemblerConfig, AssemblerState, Segment, SegmentAssembler, SessionId};

// Backend
pub use backend::{GatewayConfig, TranscriptionBackend, TranscriptionGateway, WebSocketBackend};

// Session management and transport
pub use registry::SessionRegistry;
pub use server::WsServer;

// Error handling
pub use error::{Result, SpeechgateError};

// Config
pub use config::Config;
