//! Metrics collection and registry.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registering or encoding a metric failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of service state for gauge updates.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Whether the camera is streaming.
    pub is_streaming: bool,
    /// Whether the camera device is held open.
    pub camera_available: bool,
    /// Whether the last relay delivery succeeded.
    pub relay_connected: bool,
}

/// Prometheus metrics registry for the capture pipeline.
///
/// Cloning is cheap; clones update the same underlying metrics.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,

    // Capture metrics
    frames_captured: IntCounter,
    capture_misses: IntCounter,
    encode_failures: IntCounter,

    // Relay metrics
    relay_deliveries: IntCounter,
    relay_failures: IntCounter,
    relay_connected: IntGauge,

    // Service metrics
    streaming_status: IntGauge,
    camera_available: IntGauge,
    active_viewers: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_captured = IntCounter::new(
            "camera_relay_frames_captured_total",
            "Total frames read from the camera",
        )?;
        let capture_misses = IntCounter::new(
            "camera_relay_capture_misses_total",
            "Camera reads that returned no frame",
        )?;
        let encode_failures = IntCounter::new(
            "camera_relay_encode_failures_total",
            "Frames that could not be JPEG encoded",
        )?;

        let relay_deliveries = IntCounter::new(
            "camera_relay_relay_deliveries_total",
            "Frames accepted by the remote endpoint",
        )?;
        let relay_failures = IntCounter::new(
            "camera_relay_relay_failures_total",
            "Failed frame deliveries to the remote endpoint",
        )?;
        let relay_connected = IntGauge::new(
            "camera_relay_relay_connected",
            "Remote endpoint reachability (1=connected, 0=disconnected)",
        )?;

        let streaming_status = IntGauge::new(
            "camera_relay_streaming_status",
            "Current streaming status (1=streaming, 0=stopped)",
        )?;
        let camera_available = IntGauge::new(
            "camera_relay_camera_available",
            "Camera device held open (1=open, 0=closed)",
        )?;
        let active_viewers = IntGauge::new(
            "camera_relay_active_viewers",
            "Connected local stream viewers",
        )?;

        registry.register(Box::new(frames_captured.clone()))?;
        registry.register(Box::new(capture_misses.clone()))?;
        registry.register(Box::new(encode_failures.clone()))?;
        registry.register(Box::new(relay_deliveries.clone()))?;
        registry.register(Box::new(relay_failures.clone()))?;
        registry.register(Box::new(relay_connected.clone()))?;
        registry.register(Box::new(streaming_status.clone()))?;
        registry.register(Box::new(camera_available.clone()))?;
        registry.register(Box::new(active_viewers.clone()))?;

        Ok(Self {
            registry,
            frames_captured,
            capture_misses,
            encode_failures,
            relay_deliveries,
            relay_failures,
            relay_connected,
            streaming_status,
            camera_available,
            active_viewers,
        })
    }

    /// Counts a frame read from the camera.
    pub fn record_capture(&self) {
        self.frames_captured.inc();
    }

    /// Counts a camera read that produced no frame.
    pub fn record_capture_miss(&self) {
        self.capture_misses.inc();
    }

    /// Counts a frame that failed to encode.
    pub fn record_encode_failure(&self) {
        self.encode_failures.inc();
    }

    /// Records the outcome of one relay delivery attempt.
    pub fn record_delivery(&self, delivered: bool) {
        if delivered {
            self.relay_deliveries.inc();
        } else {
            self.relay_failures.inc();
        }
        self.relay_connected.set(i64::from(delivered));
    }

    /// Marks a viewer stream as opened.
    pub fn viewer_connected(&self) {
        self.active_viewers.inc();
    }

    /// Marks a viewer stream as closed.
    pub fn viewer_disconnected(&self) {
        self.active_viewers.dec();
    }

    /// Number of connected local viewers.
    pub fn active_viewers(&self) -> i64 {
        self.active_viewers.get()
    }

    /// Updates gauges from a snapshot of service state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.streaming_status.set(i64::from(snapshot.is_streaming));
        self.camera_available.set(i64::from(snapshot.camera_available));
        self.relay_connected.set(i64::from(snapshot.relay_connected));
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl MetricsSnapshot {
    /// Creates a snapshot from a lifecycle status report.
    pub fn from_status(status: &crate::lifecycle::CameraStatus) -> Self {
        Self {
            is_streaming: status.is_streaming,
            camera_available: status.camera_available,
            relay_connected: status
                .relay
                .as_ref()
                .map(|relay| relay.connected)
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        registry.update(&MetricsSnapshot {
            is_streaming: true,
            camera_available: true,
            relay_connected: false,
        });
        registry.record_capture();
        registry.record_capture();
        registry.record_delivery(true);

        let output = registry.encode().unwrap();
        assert!(output.contains("camera_relay_streaming_status 1"));
        assert!(output.contains("camera_relay_frames_captured_total 2"));
        assert!(output.contains("camera_relay_relay_deliveries_total 1"));
        assert!(output.contains("camera_relay_relay_connected 1"));
    }

    #[test]
    fn test_clones_share_metrics() {
        let registry = MetricsRegistry::new().unwrap();
        let clone = registry.clone();

        clone.viewer_connected();
        clone.viewer_connected();
        registry.viewer_disconnected();
        assert_eq!(registry.active_viewers(), 1);
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("camera_relay_active_viewers"));
        assert!(output.contains("camera_relay_relay_failures_total"));
        assert!(output.contains("camera_relay_capture_misses_total"));
    }
}
