//! Transcription backend abstraction.
//!
//! The gateway talks to any `TranscriptionBackend`; the production
//! implementation is the per-request WebSocket client in `ws`.

pub mod gateway;
pub mod ws;

pub use gateway::{GatewayConfig, TranscriptionGateway};
pub use ws::WebSocketBackend;

use crate::error::Result;
use async_trait::async_trait;

/// A service that turns one encoded audio payload into text.
///
/// Implementations are stateless per request; each call is independent.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Transcribes one WAV-encoded payload and returns the recognized text.
    async fn transcribe(&self, wav: &[u8]) -> Result<String>;

    /// Human-readable identifier for logging.
    fn name(&self) -> &str;
}

/// Scripted backend for tests: returns canned responses or errors and
/// records the payloads it received.
pub struct MockBackend {
    response: std::sync::Mutex<MockResponse>,
    received: std::sync::Mutex<Vec<Vec<u8>>>,
}

#[derive(Clone)]
enum MockResponse {
    Text(String),
    Error(String),
    Hang(std::time::Duration),
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            response: std::sync::Mutex::new(MockResponse::Text(String::new())),
            received: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Responds to every request with the given text.
    pub fn with_response(self, text: &str) -> Self {
        *self.response.lock().unwrap() = MockResponse::Text(text.to_string());
        self
    }

    /// Fails every request with the given message.
    pub fn with_error(self, message: &str) -> Self {
        *self.response.lock().unwrap() = MockResponse::Error(message.to_string());
        self
    }

    /// Sleeps for the given duration before responding, to exercise
    /// timeout handling.
    pub fn with_delay(self, delay: std::time::Duration) -> Self {
        *self.response.lock().unwrap() = MockResponse::Hang(delay);
        self
    }

    /// Payloads received so far.
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().unwrap().clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptionBackend for MockBackend {
    async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        self.received.lock().unwrap().push(wav.to_vec());
        let response = self.response.lock().unwrap().clone();
        match response {
            MockResponse::Text(t) => Ok(t),
            MockResponse::Error(m) => {
                Err(crate::error::SpeechgateError::BackendProtocol { message: m })
            }
            MockResponse::Hang(d) => {
                tokio::time::sleep(d).await;
                Ok(String::new())
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
