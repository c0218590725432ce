//! Frame compression for transport.
//!
//! Both the local MJPEG stream and the remote relay send individual JPEG
//! images; there is no inter-frame coding.

mod jpeg;

pub use jpeg::{EncodeError, EncodedChunk, StreamEncoder};
