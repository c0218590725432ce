//! Local MJPEG streaming to HTTP viewers.
//!
//! Each viewer gets its own lazy stream that polls the shared
//! [`LatestFrameBuffer`] once per tick and encodes only frames it has not
//! sent yet. Viewers never block the capture task or each other.

use crate::capture::LatestFrameBuffer;
use crate::encoding::{EncodedChunk, StreamEncoder};
use crate::metrics::MetricsRegistry;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Multipart boundary separating frames.
pub const BOUNDARY: &str = "frame";

/// `Content-Type` of the multipart response.
pub fn content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={BOUNDARY}")
}

/// Frames one encoded chunk as a multipart part.
pub fn multipart_part(chunk: &EncodedChunk) -> Bytes {
    let header = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        chunk.len()
    );
    let mut part = BytesMut::with_capacity(header.len() + chunk.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(&chunk.data);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// Produces per-viewer JPEG streams from the shared buffer.
#[derive(Clone)]
pub struct LocalStreamer {
    buffer: LatestFrameBuffer,
    encoder: StreamEncoder,
    quality: u8,
    interval: Duration,
    metrics: MetricsRegistry,
}

impl LocalStreamer {
    /// Creates a streamer reading from `buffer`.
    pub fn new(
        buffer: LatestFrameBuffer,
        quality: u8,
        interval: Duration,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            buffer,
            encoder: StreamEncoder::new(),
            quality,
            interval,
            metrics,
        }
    }

    /// Encoded frames for one viewer until `session` is cancelled.
    ///
    /// The viewer counts as active until the stream is dropped.
    pub fn chunks(
        &self,
        session: CancellationToken,
    ) -> impl Stream<Item = EncodedChunk> + Send + 'static {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.metrics.viewer_connected();
        let viewer = Viewer {
            streamer: self.clone(),
            session,
            ticker,
            last_sent: None,
        };

        stream::unfold(viewer, |mut viewer| async move {
            let chunk = viewer.next_chunk().await?;
            Some((chunk, viewer))
        })
    }

    /// Multipart body stream for one viewer.
    pub fn multipart(
        &self,
        session: CancellationToken,
    ) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        self.chunks(session)
            .map(|chunk| Ok::<_, Infallible>(multipart_part(&chunk)))
    }
}

struct Viewer {
    streamer: LocalStreamer,
    session: CancellationToken,
    ticker: Interval,
    last_sent: Option<u64>,
}

impl Viewer {
    async fn next_chunk(&mut self) -> Option<EncodedChunk> {
        loop {
            tokio::select! {
                biased;
                _ = self.session.cancelled() => return None,
                _ = self.ticker.tick() => {}
            }

            let Some(frame) = self.streamer.buffer.read_latest() else {
                continue;
            };
            if self.last_sent == Some(frame.sequence()) {
                continue;
            }
            self.last_sent = Some(frame.sequence());

            match self.streamer.encoder.encode(&frame, self.streamer.quality) {
                Ok(chunk) => return Some(chunk),
                Err(e) => {
                    tracing::debug!(
                        error = %e,
                        sequence = frame.sequence(),
                        "Skipping frame for viewer"
                    );
                    self.streamer.metrics.record_encode_failure();
                }
            }
        }
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.streamer.metrics.viewer_disconnected();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Frame;

    fn streamer(buffer: &LatestFrameBuffer, metrics: &MetricsRegistry) -> LocalStreamer {
        LocalStreamer::new(buffer.clone(), 80, Duration::from_millis(5), metrics.clone())
    }

    fn test_frame(sequence: u64) -> Frame {
        Frame::rgb(vec![200u8; 16 * 8 * 3], 16, 8, sequence)
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(), "multipart/x-mixed-replace; boundary=frame");
    }

    #[test]
    fn test_multipart_part_layout() {
        let chunk = EncodedChunk {
            data: Bytes::from_static(b"JPEG"),
            quality: 80,
            width: 1,
            height: 1,
            sequence: 1,
        };
        let part = multipart_part(&chunk);
        assert_eq!(
            &part[..],
            b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\nJPEG\r\n"
        );
    }

    #[tokio::test]
    async fn test_unchanged_frame_sent_once() {
        let buffer = LatestFrameBuffer::new();
        let metrics = MetricsRegistry::new().unwrap();
        buffer.write(test_frame(1));

        let session = CancellationToken::new();
        let mut chunks = Box::pin(streamer(&buffer, &metrics).chunks(session.clone()));

        let first = chunks.next().await.unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(&first.data[0..2], &[0xFF, 0xD8]);

        // Nothing new is written, so the next poll keeps waiting.
        let pending = tokio::time::timeout(Duration::from_millis(50), chunks.next()).await;
        assert!(pending.is_err());

        buffer.write(test_frame(2));
        assert_eq!(chunks.next().await.unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn test_stream_ends_on_cancel() {
        let buffer = LatestFrameBuffer::new();
        let metrics = MetricsRegistry::new().unwrap();
        let session = CancellationToken::new();
        let mut chunks = Box::pin(streamer(&buffer, &metrics).chunks(session.clone()));

        session.cancel();
        assert!(chunks.next().await.is_none());
    }

    #[tokio::test]
    async fn test_viewers_are_independent() {
        let buffer = LatestFrameBuffer::new();
        let metrics = MetricsRegistry::new().unwrap();
        let session = CancellationToken::new();
        let local = streamer(&buffer, &metrics);

        let mut a = Box::pin(local.chunks(session.clone()));
        let mut b = Box::pin(local.chunks(session.clone()));
        assert_eq!(metrics.active_viewers(), 2);

        buffer.write(test_frame(7));
        assert_eq!(a.next().await.unwrap().sequence, 7);

        // Viewer `b` still receives the frame that `a` already consumed.
        assert_eq!(b.next().await.unwrap().sequence, 7);

        drop(a);
        assert_eq!(metrics.active_viewers(), 1);

        buffer.write(test_frame(8));
        assert_eq!(b.next().await.unwrap().sequence, 8);

        drop(b);
        assert_eq!(metrics.active_viewers(), 0);
    }

    #[tokio::test]
    async fn test_multipart_stream() {
        let buffer = LatestFrameBuffer::new();
        let metrics = MetricsRegistry::new().unwrap();
        buffer.write(test_frame(3));

        let session = CancellationToken::new();
        let mut parts = Box::pin(streamer(&buffer, &metrics).multipart(session));
        let part = parts.next().await.unwrap().unwrap();

        assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n"));
        assert!(part.ends_with(b"\r\n"));
    }
}
