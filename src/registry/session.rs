//! Per-session worker and dispatch tasks.
//!
//! Each session runs two tasks: a worker that feeds the segment assembler
//! in arrival order, and a dispatch task that serializes backend calls so
//! results always come back in segment order. Dropping the input sender
//! triggers a teardown flush before both tasks exit.

use crate::backend::{TranscriptionBackend, TranscriptionGateway};
use crate::defaults;
use crate::segment::{AssemblerConfig, Segment, SegmentAssembler, SessionId, TranscriptResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Inputs accepted by a session worker, in producer arrival order.
#[derive(Debug)]
pub enum SessionInput {
    /// One raw PCM frame.
    Frame(Vec<u8>),
    /// Discard buffered audio without dispatching.
    Reset,
    /// Flush buffered audio as a final segment.
    EndOfStream,
}

/// Handle to a live session held by the registry.
pub struct SessionHandle {
    pub input: mpsc::Sender<SessionInput>,
    pub worker: JoinHandle<()>,
}

/// Spawns the worker and dispatch tasks for one session.
///
/// Results for every dispatched segment are delivered on `outbound` in
/// sequence order. Depth of the input queue bounds how far the producer
/// can run ahead of classification.
pub fn spawn_session<B: TranscriptionBackend + 'static>(
    session_id: SessionId,
    config: AssemblerConfig,
    speech_threshold: f32,
    gateway: Arc<TranscriptionGateway<B>>,
    outbound: mpsc::Sender<TranscriptResult>,
) -> SessionHandle {
    let (input_tx, input_rx) = mpsc::channel(defaults::DISPATCH_QUEUE_DEPTH * 4);
    let (segment_tx, segment_rx) = mpsc::channel(defaults::DISPATCH_QUEUE_DEPTH);

    let dispatch = tokio::spawn(run_dispatch(session_id, segment_rx, gateway, outbound));
    let worker = tokio::spawn(run_worker(
        session_id,
        config,
        speech_threshold,
        input_rx,
        segment_tx,
        dispatch,
    ));

    SessionHandle {
        input: input_tx,
        worker,
    }
}

/// Feeds frames through the assembler and hands completed segments to the
/// dispatch task. Exits when the input channel closes, flushing first.
async fn run_worker(
    session_id: SessionId,
    config: AssemblerConfig,
    speech_threshold: f32,
    mut input: mpsc::Receiver<SessionInput>,
    segments: mpsc::Sender<Segment>,
    dispatch: JoinHandle<()>,
) {
    let mut assembler = SegmentAssembler::new(session_id, config, speech_threshold);

    while let Some(message) = input.recv().await {
        let segment = match message {
            SessionInput::Frame(frame) => {
                trace!(session = %session_id, bytes = frame.len(), "frame received");
                assembler.push_frame(&frame)
            }
            SessionInput::Reset => {
                debug!(session = %session_id, "buffer reset requested");
                assembler.reset();
                None
            }
            SessionInput::EndOfStream => {
                debug!(session = %session_id, "end of stream requested");
                assembler.flush()
            }
        };

        if let Some(segment) = segment {
            // Bounded queue: a slow backend applies backpressure here.
            if segments.send(segment).await.is_err() {
                break;
            }
        }
    }

    // Teardown: whatever is still buffered goes out as a final segment.
    if let Some(segment) = assembler.flush() {
        debug!(
            session = %session_id,
            bytes = segment.pcm.len(),
            "teardown flush"
        );
        let _ = segments.send(segment).await;
    }

    drop(segments);
    let _ = dispatch.await;
    debug!(session = %session_id, "worker stopped");
}

/// Calls the gateway for each segment in turn. One segment in flight at a
/// time keeps result order identical to segment order.
async fn run_dispatch<B: TranscriptionBackend>(
    session_id: SessionId,
    mut segments: mpsc::Receiver<Segment>,
    gateway: Arc<TranscriptionGateway<B>>,
    outbound: mpsc::Sender<TranscriptResult>,
) {
    while let Some(segment) = segments.recv().await {
        let result = gateway.transcribe_segment(&segment).await;
        if outbound.send(result).await.is_err() {
            // Producer is gone; keep draining so the worker never blocks.
            continue;
        }
    }
    trace!(session = %session_id, "dispatch stopped");
}
