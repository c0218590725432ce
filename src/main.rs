//! Camera Relay service
//!
//! Serves a local camera as an MJPEG stream over HTTP and, when a remote
//! endpoint is configured, relays every new frame to it.

use camera_relay::{
    capture::CameraFactory,
    config::{ConfigError, FileConfig},
    lifecycle::CameraLifecycleController,
    metrics::{MetricsError, MetricsRegistry},
    relay::RelayError,
    server::{AppState, ServerError, StreamServer},
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "camera-relay", version, about = "Local camera MJPEG stream with remote relay")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Camera device index
    #[arg(short, long)]
    device: Option<u32>,

    /// Base URL of the remote endpoint; enables the relay
    #[arg(long)]
    relay_url: Option<String>,

    /// Stream identifier sent with every relayed frame
    #[arg(long)]
    stream_id: Option<String>,

    /// Do not open the camera at startup
    #[arg(long)]
    no_autostart: bool,

    /// Log filter, e.g. `debug` or `camera_relay=trace` (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error("failed to create relay client: {0}")]
    Relay(#[from] RelayError),
    #[error(transparent)]
    Server(#[from] ServerError),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    if let Err(e) = run(args).await {
        error!(error = %e, "Camera relay failed");
        std::process::exit(1);
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(args: Args) -> Result<(), StartupError> {
    info!("Camera Relay v{}", camera_relay::VERSION);

    let config = load_config(&args)?;
    let metrics = MetricsRegistry::new()?;
    let controller = Arc::new(
        CameraLifecycleController::new(config.camera.clone(), camera_factory(), metrics.clone())
            .with_relay(&config.relay)?,
    );

    match controller.relay_client() {
        Some(client) => {
            if client.check_server_connection().await {
                info!(url = %client.stream_url(), "Remote endpoint reachable");
            } else {
                warn!(
                    url = %client.stream_url(),
                    "Remote endpoint not reachable, frames will be retried while streaming"
                );
            }
        }
        None => info!("Relay disabled"),
    }

    if !args.no_autostart {
        if let Err(e) = controller.start().await {
            warn!(error = %e, "Camera auto-start failed, use POST /start_camera to retry");
        }
    }

    let state = AppState::new(
        Arc::clone(&controller),
        &config.relay,
        config.server.stream_interval(),
        metrics,
    );

    // Stopping the camera ends the open viewer streams, which lets the
    // graceful shutdown complete.
    let shutdown = {
        let controller = Arc::clone(&controller);
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
            controller.stop().await;
        }
    };

    StreamServer::new(config.server, state).run(shutdown).await?;
    Ok(())
}

/// Loads the config file (or defaults) and applies command-line overrides.
fn load_config(args: &Args) -> Result<FileConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(device) = args.device {
        config.camera.device_id = device;
    }
    if let Some(url) = &args.relay_url {
        config.relay.base_url = url.clone();
        config.relay.enabled = true;
    }
    if let Some(stream_id) = &args.stream_id {
        config.relay.stream_id = stream_id.clone();
    }

    config.validate()?;
    Ok(config)
}

#[cfg(feature = "camera")]
fn camera_factory() -> CameraFactory {
    camera_relay::capture::NativeCamera::factory()
}

#[cfg(not(feature = "camera"))]
fn camera_factory() -> CameraFactory {
    use camera_relay::capture::MockCamera;

    warn!("Built without the `camera` feature, serving a synthetic test pattern");
    MockCamera::factory(MockCamera::new)
}
