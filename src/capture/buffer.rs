//! Single-slot mailbox holding the most recent frame.

use super::Frame;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Shared cell exposing only the latest captured frame.
///
/// Writes swap the slot atomically, so a concurrent reader sees either
/// the previous frame or the new one in full. Clones share the same slot.
#[derive(Clone, Default)]
pub struct LatestFrameBuffer {
    slot: Arc<ArcSwapOption<Frame>>,
}

impl LatestFrameBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored frame.
    pub fn write(&self, frame: Frame) {
        self.slot.store(Some(Arc::new(frame)));
    }

    /// Returns a copy of the latest frame, or `None` before the first write.
    pub fn read_latest(&self) -> Option<Frame> {
        self.slot.load_full().map(|frame| Frame::clone(&frame))
    }

    /// Sequence number of the stored frame, without copying it.
    pub fn latest_sequence(&self) -> Option<u64> {
        self.slot.load().as_ref().map(|frame| frame.sequence())
    }

    /// Empties the slot.
    pub fn clear(&self) {
        self.slot.store(None);
    }
}

impl std::fmt::Debug for LatestFrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatestFrameBuffer")
            .field("latest_sequence", &self.latest_sequence())
            .finish()
    }
}
