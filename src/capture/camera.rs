//! Camera abstraction for frame capture.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and mock implementations for testing.

use super::{CaptureConfig, Frame, PixelFormat};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// No device exists at the requested index.
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    /// The device exists but could not be opened.
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    /// The device rejected the requested format.
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    /// A single read failed; the next read may succeed.
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    /// The camera was used before `open`.
    #[error("camera not initialized")]
    NotInitialized,
}

impl CameraError {
    /// Returns true for single read misses that the next tick may recover from.
    pub fn is_transient(&self) -> bool {
        matches!(self, CameraError::CaptureFailed(_))
    }
}

/// Trait for camera implementations.
///
/// Implementations are not required to be `Send`: device handles are
/// created and used on the capture thread only.
pub trait Camera {
    /// Opens and initializes the camera with the given configuration.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError>;

    /// Captures a single frame, blocking until the device delivers one.
    fn capture(&mut self) -> Result<Frame, CameraError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Closes the camera and releases resources.
    fn close(&mut self);
}

/// Builds a fresh camera instance on the capture thread.
pub type CameraFactory = Arc<dyn Fn() -> Box<dyn Camera> + Send + Sync>;

/// Mock camera for testing that generates synthetic frames.
///
/// Produces a moving RGB (or gray) gradient. Device ids at or above
/// `device_count` behave like missing hardware.
#[derive(Debug)]
pub struct MockCamera {
    config: Option<CaptureConfig>,
    sequence: u64,
    device_count: u32,
    miss_every: Option<u64>,
    reads: u64,
    open_handles: Option<Arc<AtomicUsize>>,
}

impl Default for MockCamera {
    fn default() -> Self {
        Self {
            config: None,
            sequence: 0,
            device_count: 1,
            miss_every: None,
            reads: 0,
            open_handles: None,
        }
    }
}

impl MockCamera {
    /// Creates a mock with one device and no read misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a machine with `count` attached devices.
    pub fn with_devices(mut self, count: u32) -> Self {
        self.device_count = count;
        self
    }

    /// Makes every `n`-th read fail transiently.
    pub fn with_miss_every(mut self, n: u64) -> Self {
        self.miss_every = Some(n.max(1));
        self
    }

    /// Counts currently open handles in `counter`, shared across instances.
    pub fn track_open_handles(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.open_handles = Some(counter);
        self
    }

    /// Returns a factory producing mock cameras configured by `build`.
    pub fn factory<F>(build: F) -> CameraFactory
    where
        F: Fn() -> MockCamera + Send + Sync + 'static,
    {
        Arc::new(move || Box::new(build()) as Box<dyn Camera>)
    }

    fn render(&self, config: &CaptureConfig) -> Frame {
        let format = if config.grayscale {
            PixelFormat::Gray8
        } else {
            PixelFormat::Rgb8
        };
        let (width, height) = (config.width as usize, config.height as usize);
        let shift = self.sequence as usize;
        let mut pixels = Vec::with_capacity(width * height * format.channels());
        for y in 0..height {
            for x in 0..width {
                let value = ((x + y + shift) % 256) as u8;
                match format {
                    PixelFormat::Gray8 => pixels.push(value),
                    PixelFormat::Rgb8 => {
                        pixels.extend_from_slice(&[value, (y % 256) as u8, (x % 256) as u8])
                    }
                }
            }
        }
        Frame::new(pixels, config.width, config.height, format, self.sequence)
    }
}

impl Camera for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        if config.device_id >= self.device_count {
            return Err(CameraError::DeviceNotFound(format!(
                "mock device {}",
                config.device_id
            )));
        }
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        if self.config.is_none() {
            if let Some(counter) = &self.open_handles {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.config = Some(config.clone());
        self.sequence = 0;
        self.reads = 0;
        tracing::info!(device = config.device_id, "MockCamera opened");
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let config = self.config.as_ref().ok_or(CameraError::NotInitialized)?;

        self.reads += 1;
        if let Some(n) = self.miss_every {
            if self.reads % n == 0 {
                return Err(CameraError::CaptureFailed("device not ready".into()));
            }
        }

        self.sequence += 1;
        Ok(self.render(config))
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        if self.config.take().is_some() {
            if let Some(counter) = &self.open_handles {
                counter.fetch_sub(1, Ordering::SeqCst);
            }
            tracing::info!("MockCamera closed");
        }
    }
}
