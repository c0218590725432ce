//! Camera Relay Library
//!
//! Captures frames from a local camera and publishes them two ways: as a
//! local MJPEG stream for browsers, and as JPEG frames POSTed to a remote
//! HTTP ingestion endpoint.
//!
//! # Architecture
//!
//! ```text
//!                       +--> stream (per viewer) --> /video_feed
//! capture --> buffer ---+
//!                       +--> relay -------------> remote endpoint
//!
//! lifecycle: start/stop of capture and relay for one session
//! ```
//!
//! The capture task is the only writer of the latest-frame buffer; viewers
//! and the relay each read it at their own pace. A streaming session is
//! represented by a cancellation token, and stopping the camera cancels it
//! for every consumer at once.
//!
//! # Example
//!
//! ```no_run
//! use camera_relay::{
//!     capture::{CaptureConfig, MockCamera},
//!     lifecycle::CameraLifecycleController,
//!     metrics::MetricsRegistry,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let controller = CameraLifecycleController::new(
//!     CaptureConfig::default(),
//!     MockCamera::factory(MockCamera::new),
//!     MetricsRegistry::new()?,
//! );
//!
//! controller.start().await?;
//! if let Some(frame) = controller.buffer().read_latest() {
//!     println!("frame {} is {}x{}", frame.sequence(), frame.width(), frame.height());
//! }
//! controller.stop().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

/// Camera input, the latest-frame buffer and the capture loop.
pub mod capture;
/// Configuration file format.
pub mod config;
/// JPEG compression of frames.
pub mod encoding;
/// Camera start/stop state machine.
pub mod lifecycle;
/// Prometheus metrics.
pub mod metrics;
/// Delivery of frames to the remote endpoint.
pub mod relay;
/// HTTP server and routes.
pub mod server;
/// Per-viewer MJPEG streams.
pub mod stream;

// Re-export commonly used types at crate root
pub use capture::{Camera, CaptureConfig, Frame, LatestFrameBuffer, MockCamera};
pub use config::{ConfigError, FileConfig};
pub use encoding::{EncodedChunk, StreamEncoder};
pub use lifecycle::{CameraLifecycleController, CameraStatus, StreamingState};
pub use relay::{RelayClient, RelayConfig, RelayStatus};
pub use server::{ServerConfig, StreamServer};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
