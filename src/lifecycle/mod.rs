//! Camera lifecycle management.
//!
//! ```text
//! Stopped --start--> Starting --open ok--> Streaming
//!    ^                   |                     |
//!    +----open failed----+                     |
//!    +------------------stop-------------------+
//! ```

mod controller;

pub use controller::{
    CameraLifecycleController, CameraStatus, LifecycleError, StreamingState,
    DEFAULT_STOP_TIMEOUT,
};
