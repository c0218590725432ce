//! Prometheus metrics for the capture pipeline.
//!
//! Exposed by the HTTP service at `/metrics`.
//!
//! # Metrics Exposed
//!
//! ## Capture
//! - `camera_relay_frames_captured_total` - Frames read from the camera
//! - `camera_relay_capture_misses_total` - Reads that returned no frame
//! - `camera_relay_encode_failures_total` - Frames that failed JPEG encoding
//!
//! ## Relay
//! - `camera_relay_relay_deliveries_total` - Frames accepted by the remote endpoint
//! - `camera_relay_relay_failures_total` - Failed deliveries
//! - `camera_relay_relay_connected` - Remote endpoint reachability
//!
//! ## Service
//! - `camera_relay_streaming_status` - 1 while streaming
//! - `camera_relay_camera_available` - 1 while the device is open
//! - `camera_relay_active_viewers` - Connected local stream viewers

mod collector;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
