//! Native camera backend built on nokhwa.

use super::{Camera, CameraError, CameraFactory, CaptureConfig, Frame, PixelFormat};
use nokhwa::pixel_format::{LumaFormat, RgbFormat};
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use std::sync::Arc;

/// A local video device (webcam) opened through the platform backend.
#[derive(Default)]
pub struct NativeCamera {
    inner: Option<nokhwa::Camera>,
    grayscale: bool,
    sequence: u64,
}

impl NativeCamera {
    /// Creates a closed camera.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a factory producing native cameras.
    pub fn factory() -> CameraFactory {
        Arc::new(|| Box::new(NativeCamera::new()) as Box<dyn Camera>)
    }
}

impl Camera for NativeCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        let closest = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::MJPEG,
            config.fps,
        );
        let requested = if config.grayscale {
            RequestedFormat::new::<LumaFormat>(RequestedFormatType::Closest(closest))
        } else {
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(closest))
        };

        let mut camera = nokhwa::Camera::new(CameraIndex::Index(config.device_id), requested)
            .map_err(|e| CameraError::DeviceNotFound(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CameraError::OpenFailed(e.to_string()))?;

        let format = camera.camera_format();
        tracing::info!(
            device = config.device_id,
            width = format.width(),
            height = format.height(),
            fps = format.frame_rate(),
            "Native camera stream opened"
        );

        self.inner = Some(camera);
        self.grayscale = config.grayscale;
        self.sequence = 0;
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let camera = self.inner.as_mut().ok_or(CameraError::NotInitialized)?;
        let buffer = camera
            .frame()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

        self.sequence += 1;
        if self.grayscale {
            let image = buffer
                .decode_image::<LumaFormat>()
                .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
            let (width, height) = (image.width(), image.height());
            Ok(Frame::new(
                image.into_raw(),
                width,
                height,
                PixelFormat::Gray8,
                self.sequence,
            ))
        } else {
            let image = buffer
                .decode_image::<RgbFormat>()
                .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
            let (width, height) = (image.width(), image.height());
            Ok(Frame::rgb(image.into_raw(), width, height, self.sequence))
        }
    }

    fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn close(&mut self) {
        if let Some(mut camera) = self.inner.take() {
            if let Err(e) = camera.stop_stream() {
                tracing::warn!(error = %e, "Failed to stop camera stream cleanly");
            }
        }
    }
}
