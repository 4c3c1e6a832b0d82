//! WebSocket transcription backend.
//!
//! Opens a fresh connection per request: sends the WAV payload as one
//! binary message, follows it with an empty binary end marker, and waits
//! for a single JSON text reply of the form `{"text": "..."}` (or
//! `{"error": "..."}` on backend failure).

use crate::backend::TranscriptionBackend;
use crate::error::{Result, SpeechgateError};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Reply payload from the recognition service.
#[derive(Debug, Deserialize)]
struct BackendReply {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Per-request WebSocket client for a stateless recognition service.
pub struct WebSocketBackend {
    endpoint: String,
}

impl WebSocketBackend {
    /// Creates a backend client for the given `ws://` or `wss://` endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Parses the reply text into recognized text or a protocol error.
    fn parse_reply(raw: &str) -> Result<String> {
        let reply: BackendReply =
            serde_json::from_str(raw).map_err(|e| SpeechgateError::BackendProtocol {
                message: format!("unparseable reply: {}", e),
            })?;

        if let Some(error) = reply.error {
            return Err(SpeechgateError::BackendProtocol { message: error });
        }
        reply.text.ok_or_else(|| SpeechgateError::BackendProtocol {
            message: "reply carried neither text nor error".to_string(),
        })
    }
}

#[async_trait]
impl TranscriptionBackend for WebSocketBackend {
    async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        let (mut stream, _) =
            connect_async(self.endpoint.as_str())
                .await
                .map_err(|e| SpeechgateError::BackendConnection {
                    message: format!("connect to {} failed: {}", self.endpoint, e),
                })?;
        debug!(endpoint = %self.endpoint, bytes = wav.len(), "dispatching segment");

        stream
            .send(Message::Binary(wav.to_vec().into()))
            .await
            .map_err(|e| SpeechgateError::BackendConnection {
                message: format!("payload send failed: {}", e),
            })?;
        // Empty binary frame marks end of audio for this request.
        stream
            .send(Message::Binary(Vec::new().into()))
            .await
            .map_err(|e| SpeechgateError::BackendConnection {
                message: format!("end marker send failed: {}", e),
            })?;

        let text = loop {
            let message = stream
                .next()
                .await
                .ok_or_else(|| SpeechgateError::BackendConnection {
                    message: "connection closed before reply".to_string(),
                })?
                .map_err(|e| SpeechgateError::BackendConnection {
                    message: format!("receive failed: {}", e),
                })?;

            match message {
                Message::Text(raw) => break Self::parse_reply(raw.as_str())?,
                Message::Close(_) => {
                    return Err(SpeechgateError::BackendConnection {
                        message: "connection closed before reply".to_string(),
                    });
                }
                // Ping/pong and stray binary frames are not the reply.
                _ => continue,
            }
        };

        let _ = stream.close(None).await;
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.endpoint
    }
}
