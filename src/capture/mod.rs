//! Camera input and frame handling.
//!
//! A [`FrameSource`] owns the camera device and is the only writer of the
//! [`LatestFrameBuffer`]. Every consumer (local viewers, the remote relay)
//! reads from that buffer and never touches the device directly.

mod buffer;
mod camera;
mod config;
#[cfg(feature = "camera")]
mod device;
mod frame;
mod source;
mod worker;

pub use buffer::LatestFrameBuffer;
pub use camera::{Camera, CameraError, CameraFactory, MockCamera};
pub use config::CaptureConfig;
#[cfg(feature = "camera")]
pub use device::NativeCamera;
pub use frame::{Frame, PixelFormat};
pub use source::FrameSource;
pub use worker::CaptureWorker;
