use anyhow::Result;
use clap::Parser;
use speechgate::backend::{GatewayConfig, TranscriptionGateway, WebSocketBackend};
use speechgate::config::Config;
use speechgate::registry::SessionRegistry;
use speechgate::segment::AssemblerConfig;
use speechgate::server::WsServer;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Voice-activity-gated speech segmentation and transcription dispatch.
#[derive(Parser, Debug)]
#[command(name = "speechgate", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "speechgate.toml")]
    config: PathBuf,

    /// Listen address override (host:port)
    #[arg(short, long)]
    listen: Option<String>,

    /// Transcription backend endpoint override (ws://...)
    #[arg(short, long)]
    backend: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "speechgate=debug"
    } else {
        "speechgate=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = Config::load_or_default(&cli.config)?.with_env_overrides();
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }
    if let Some(backend) = cli.backend {
        config.backend.endpoint = backend;
    }
    config.validate()?;

    info!(
        listen = %config.server.listen_addr,
        backend = %config.backend.endpoint,
        "starting speechgate"
    );

    let gateway = TranscriptionGateway::new(
        WebSocketBackend::new(config.backend.endpoint.clone()),
        GatewayConfig {
            sample_rate: config.audio.sample_rate,
            request_timeout_ms: config.backend.request_timeout_ms,
        },
    );
    let registry = SessionRegistry::new(
        AssemblerConfig {
            sample_rate: config.audio.sample_rate,
            frame_duration_ms: config.audio.frame_duration_ms,
            silence_threshold_ms: config.segmenter.silence_threshold_ms,
            chunk_duration_ms: config.segmenter.chunk_duration_ms,
            chunk_size_bytes: config.segmenter.chunk_size_bytes,
        },
        config.audio.vad_threshold,
        gateway,
    );

    let server = WsServer::new(config.server.listen_addr.clone(), registry);
    let listener = server.bind().await?;

    tokio::select! {
        result = server.serve(listener) => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received, stopping");
        }
    }

    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => {
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
