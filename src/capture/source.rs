//! Frame source: the single writer of the latest-frame buffer.

use super::{Camera, CameraError, CaptureConfig, Frame, LatestFrameBuffer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owns a camera device and publishes every captured frame.
pub struct FrameSource {
    camera: Box<dyn Camera>,
    buffer: LatestFrameBuffer,
    device_open: Arc<AtomicBool>,
}

impl FrameSource {
    /// Creates a source that writes into `buffer`. The device stays closed
    /// until [`FrameSource::open`] succeeds.
    pub fn new(camera: Box<dyn Camera>, buffer: LatestFrameBuffer) -> Self {
        Self {
            camera,
            buffer,
            device_open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mirrors the device open state into a flag readable from other threads.
    pub fn with_open_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        flag.store(self.camera.is_open(), Ordering::SeqCst);
        self.device_open = flag;
        self
    }

    /// Acquires the device and applies the resolution and frame rate hints.
    ///
    /// On failure the device handle is released before returning.
    pub fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        match self.camera.open(config) {
            Ok(()) => {
                self.device_open.store(true, Ordering::SeqCst);
                tracing::info!(
                    device = config.device_id,
                    width = config.width,
                    height = config.height,
                    fps = config.fps,
                    "Camera opened"
                );
                Ok(())
            }
            Err(e) => {
                self.camera.close();
                self.device_open.store(false, Ordering::SeqCst);
                tracing::warn!(device = config.device_id, error = %e, "Camera failed to open");
                Err(e)
            }
        }
    }

    /// Performs one blocking read and publishes the frame.
    ///
    /// Read failures yield `None`; the caller simply tries again next tick.
    pub fn capture_once(&mut self) -> Option<Frame> {
        match self.camera.capture() {
            Ok(frame) => {
                self.buffer.write(frame.clone());
                Some(frame)
            }
            Err(e) if e.is_transient() => {
                tracing::trace!(error = %e, "Transient capture miss");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "Capture failed");
                None
            }
        }
    }

    /// Releases the device. Closing a closed source does nothing.
    pub fn close(&mut self) {
        if self.camera.is_open() {
            self.camera.close();
            tracing::info!("Camera released");
        }
        self.device_open.store(false, Ordering::SeqCst);
    }

    /// Checks if the device is open.
    pub fn is_open(&self) -> bool {
        self.camera.is_open()
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockCamera;

    fn small_config() -> CaptureConfig {
        CaptureConfig::with_dimensions(16, 12)
    }

    #[test]
    fn test_capture_publishes_to_buffer() {
        let buffer = LatestFrameBuffer::new();
        let mut source = FrameSource::new(Box::new(MockCamera::new()), buffer.clone());
        source.open(&small_config()).unwrap();

        let frame = source.capture_once().unwrap();
        assert_eq!(buffer.read_latest(), Some(frame));
    }

    #[test]
    fn test_open_failure_leaves_device_closed() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut source = FrameSource::new(
            Box::new(MockCamera::new().with_devices(0)),
            LatestFrameBuffer::new(),
        )
        .with_open_flag(Arc::clone(&flag));

        assert!(source.open(&small_config()).is_err());
        assert!(!source.is_open());
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_transient_miss_is_not_fatal() {
        let buffer = LatestFrameBuffer::new();
        let mut source = FrameSource::new(
            Box::new(MockCamera::new().with_miss_every(2)),
            buffer.clone(),
        );
        source.open(&small_config()).unwrap();

        assert!(source.capture_once().is_some());
        assert!(source.capture_once().is_none());
        assert_eq!(buffer.latest_sequence(), Some(1));
        assert!(source.capture_once().is_some());
        assert_eq!(buffer.latest_sequence(), Some(2));
    }

    #[test]
    fn test_close_is_idempotent() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut source = FrameSource::new(Box::new(MockCamera::new()), LatestFrameBuffer::new())
            .with_open_flag(Arc::clone(&flag));

        source.open(&small_config()).unwrap();
        assert!(flag.load(Ordering::SeqCst));

        source.close();
        source.close();
        assert!(!source.is_open());
        assert!(!flag.load(Ordering::SeqCst));
        assert!(source.capture_once().is_none());
    }
}
