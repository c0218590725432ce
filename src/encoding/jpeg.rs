//! JPEG encoding of captured frames.

use crate::capture::{Frame, PixelFormat};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use thiserror::Error;

/// Errors that can occur while compressing a frame.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Quality is outside 1-100.
    #[error("invalid JPEG quality {0} (must be 1-100)")]
    InvalidQuality(u8),
    /// Width or height is zero.
    #[error("frame has zero size")]
    EmptyFrame,
    /// Pixel buffer length does not match the frame dimensions.
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferMismatch {
        /// Length implied by the dimensions and format.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },
    /// The JPEG encoder failed.
    #[error("compression failed: {0}")]
    Compression(#[from] image::ImageError),
}

/// A compressed frame ready for transport.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    /// JPEG bytes.
    pub data: Bytes,
    /// Quality the frame was compressed with.
    pub quality: u8,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Sequence number of the source frame.
    pub sequence: u64,
}

impl EncodedChunk {
    /// Size of the compressed image in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no bytes were produced.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Compresses frames into baseline JPEG images.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamEncoder;

impl StreamEncoder {
    /// Creates an encoder.
    pub fn new() -> Self {
        Self
    }

    /// Encodes `frame` at `quality` (1-100).
    pub fn encode(&self, frame: &Frame, quality: u8) -> Result<EncodedChunk, EncodeError> {
        if !(1..=100).contains(&quality) {
            return Err(EncodeError::InvalidQuality(quality));
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Err(EncodeError::EmptyFrame);
        }
        if frame.pixels().len() != frame.expected_len() {
            return Err(EncodeError::BufferMismatch {
                expected: frame.expected_len(),
                actual: frame.pixels().len(),
            });
        }

        let color = match frame.format() {
            PixelFormat::Gray8 => ExtendedColorType::L8,
            PixelFormat::Rgb8 => ExtendedColorType::Rgb8,
        };

        // Roughly 10:1 for camera content; avoids regrowing for typical frames.
        let mut data = Vec::with_capacity(frame.expected_len() / 8);
        JpegEncoder::new_with_quality(&mut data, quality).encode(
            frame.pixels(),
            frame.width(),
            frame.height(),
            color,
        )?;

        Ok(EncodedChunk {
            data: Bytes::from(data),
            quality,
            width: frame.width(),
            height: frame.height(),
            sequence: frame.sequence(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gradient(width: u32, height: u32, format: PixelFormat) -> Frame {
        let len = (width * height) as usize * format.channels();
        let pixels: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        Frame::new(pixels, width, height, format, 1)
    }

    #[test]
    fn test_encode_produces_jpeg() {
        let chunk = StreamEncoder::new()
            .encode(&gradient(64, 48, PixelFormat::Rgb8), 85)
            .unwrap();

        assert_eq!(&chunk.data[0..2], &[0xFF, 0xD8]);
        assert_eq!(chunk.quality, 85);
        assert_eq!((chunk.width, chunk.height), (64, 48));
        assert_eq!(chunk.sequence, 1);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let encoder = StreamEncoder::new();
        let frame = gradient(32, 32, PixelFormat::Gray8);
        let a = encoder.encode(&frame, 70).unwrap();
        let b = encoder.encode(&frame, 70).unwrap();
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn test_rejects_invalid_quality() {
        let frame = gradient(8, 8, PixelFormat::Rgb8);
        let encoder = StreamEncoder::new();
        assert!(matches!(
            encoder.encode(&frame, 0),
            Err(EncodeError::InvalidQuality(0))
        ));
        assert!(matches!(
            encoder.encode(&frame, 101),
            Err(EncodeError::InvalidQuality(101))
        ));
    }

    #[test]
    fn test_rejects_empty_frame() {
        let frame = Frame::rgb(Vec::new(), 0, 0, 1);
        assert!(matches!(
            StreamEncoder::new().encode(&frame, 50),
            Err(EncodeError::EmptyFrame)
        ));
    }

    #[test]
    fn test_rejects_truncated_buffer() {
        let frame = Frame::rgb(vec![0u8; 10], 8, 8, 1);
        assert!(matches!(
            StreamEncoder::new().encode(&frame, 50),
            Err(EncodeError::BufferMismatch {
                expected: 192,
                actual: 10
            })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_encode_total_and_decodable(
            width in 1u32..48,
            height in 1u32..48,
            quality in 1u8..=100,
            gray in any::<bool>(),
        ) {
            let format = if gray { PixelFormat::Gray8 } else { PixelFormat::Rgb8 };
            let chunk = StreamEncoder::new()
                .encode(&gradient(width, height, format), quality)
                .unwrap();

            let decoded = image::load_from_memory_with_format(&chunk.data, image::ImageFormat::Jpeg)
                .unwrap();
            prop_assert_eq!(decoded.width(), width);
            prop_assert_eq!(decoded.height(), height);
        }
    }
}
