//! Producer-facing WebSocket server.
//!
//! Accepts producer connections, registers each as a session, and bridges
//! the socket to the registry: binary messages are PCM frames, text
//! messages are JSON control envelopes, and transcript results flow back
//! as JSON text messages in segment order.

use crate::backend::TranscriptionBackend;
use crate::error::{Result, SpeechgateError};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::SessionRegistry;
use crate::segment::{SessionId, TranscriptResult};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// WebSocket front-end over a session registry.
pub struct WsServer<B: TranscriptionBackend> {
    listen_addr: String,
    registry: Arc<SessionRegistry<B>>,
}

impl<B: TranscriptionBackend + 'static> WsServer<B> {
    /// Creates a server for the given registry.
    pub fn new(listen_addr: impl Into<String>, registry: SessionRegistry<B>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            registry: Arc::new(registry),
        }
    }

    /// Shared registry handle, for inspection.
    pub fn registry(&self) -> Arc<SessionRegistry<B>> {
        self.registry.clone()
    }

    /// Binds the listen address and returns the bound listener.
    ///
    /// Separated from `serve` so callers (and tests) can bind to port 0
    /// and learn the actual address before accepting.
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(&self.listen_addr).await.map_err(|e| {
            SpeechgateError::Other(format!("failed to bind {}: {}", self.listen_addr, e))
        })?;
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "listening for producers");
        }
        Ok(listener)
    }

    /// Accepts producer connections until the listener fails.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener
                .accept()
                .await
                .map_err(|e| SpeechgateError::Other(format!("accept failed: {}", e)))?;
            let registry = self.registry.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_producer(registry, stream, peer).await {
                    warn!(%peer, error = %e, "producer connection ended with error");
                }
            });
        }
    }
}

/// Runs one producer connection from handshake to teardown.
async fn handle_producer<B: TranscriptionBackend + 'static>(
    registry: Arc<SessionRegistry<B>>,
    stream: TcpStream,
    peer: SocketAddr,
) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| SpeechgateError::Other(format!("websocket handshake failed: {}", e)))?;
    let (mut sink, mut source) = ws.split();

    // Results and pongs share one outbound queue so wire order is stable.
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(32);
    let (result_tx, mut result_rx) = mpsc::channel::<TranscriptResult>(32);

    let session_id = registry.connect(result_tx).await;
    info!(session = %session_id, %peer, "producer connected");

    let forward_out = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(result) = result_rx.recv().await {
            if forward_out.send(ServerMessage::from(result)).await.is_err() {
                break;
            }
        }
    });

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            if sink.send(Message::Text(message.to_json().into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = source.next().await {
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                debug!(session = %session_id, error = %e, "socket read failed");
                break;
            }
        };

        match message {
            Message::Binary(frame) => {
                if let Err(e) = registry.deliver_frame(session_id, frame.to_vec()).await {
                    error!(session = %session_id, error = %e, "frame delivery failed");
                    break;
                }
            }
            Message::Text(raw) => {
                handle_control(&registry, session_id, raw.as_str(), &out_tx).await;
            }
            Message::Close(_) => break,
            // Transport pings are answered by the websocket layer.
            _ => {}
        }
    }

    // Removing the session flushes buffered audio through the pipeline;
    // the writer stays up until the last result is on the wire.
    if let Err(e) = registry.disconnect_and_wait(session_id).await {
        warn!(session = %session_id, error = %e, "disconnect failed");
    }
    let _ = forwarder.await;
    drop(out_tx);
    let _ = writer.await;

    info!(session = %session_id, %peer, "producer disconnected");
    Ok(())
}

/// Applies one JSON control message. Malformed envelopes are logged and
/// ignored; the stream continues.
async fn handle_control<B: TranscriptionBackend + 'static>(
    registry: &SessionRegistry<B>,
    session_id: SessionId,
    raw: &str,
    out: &mpsc::Sender<ServerMessage>,
) {
    let control = match ClientMessage::from_json(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!(session = %session_id, error = %e, "malformed control message");
            return;
        }
    };

    let outcome = match control {
        ClientMessage::Reset => registry.reset(session_id).await,
        ClientMessage::EndOfStream => registry.end_of_stream(session_id).await,
        ClientMessage::Ping => {
            let _ = out.send(ServerMessage::Pong).await;
            Ok(())
        }
    };

    if let Err(e) = outcome {
        warn!(session = %session_id, error = %e, "control message failed");
    }
}
