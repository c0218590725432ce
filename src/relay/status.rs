//! Relay connectivity state.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of the most recent delivery attempts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayStatus {
    /// Whether the last delivery succeeded. While the camera stalls the
    /// last frame is re-sent periodically, so this stays current.
    pub connected: bool,
    /// Error of the last failed delivery, cleared on success.
    pub last_error: Option<String>,
    /// URL frames are delivered to.
    pub target_url: String,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Frames accepted by the remote endpoint.
    pub frames_delivered: u64,
    /// Time of the last accepted frame.
    pub last_success: Option<DateTime<Utc>>,
}

impl RelayStatus {
    fn new(target_url: String) -> Self {
        Self {
            connected: false,
            last_error: None,
            target_url,
            consecutive_failures: 0,
            frames_delivered: 0,
            last_success: None,
        }
    }
}

/// Relay status shared between the relay task and status readers.
///
/// Only the relay task writes; each write swaps in a complete new value.
#[derive(Debug, Clone)]
pub struct SharedRelayStatus {
    inner: Arc<ArcSwap<RelayStatus>>,
}

impl SharedRelayStatus {
    /// Creates a disconnected status for `target_url`.
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(RelayStatus::new(target_url.into()))),
        }
    }

    /// Returns a copy of the current status.
    pub fn snapshot(&self) -> RelayStatus {
        RelayStatus::clone(&self.inner.load())
    }

    /// Records an accepted frame. Returns the previous `connected` value.
    pub fn record_success(&self) -> bool {
        let mut next = self.snapshot();
        let was_connected = next.connected;
        next.connected = true;
        next.last_error = None;
        next.consecutive_failures = 0;
        next.frames_delivered += 1;
        next.last_success = Some(Utc::now());
        self.inner.store(Arc::new(next));
        was_connected
    }

    /// Records a failed delivery. Returns the new consecutive failure count.
    pub fn record_failure(&self, error: impl ToString) -> u32 {
        let mut next = self.snapshot();
        next.connected = false;
        next.last_error = Some(error.to_string());
        next.consecutive_failures = next.consecutive_failures.saturating_add(1);
        let failures = next.consecutive_failures;
        self.inner.store(Arc::new(next));
        failures
    }

    /// Marks the relay idle, keeping counters and the last error.
    pub fn mark_disconnected(&self) {
        let mut next = self.snapshot();
        next.connected = false;
        self.inner.store(Arc::new(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disconnected() {
        let status = SharedRelayStatus::new("http://remote/api");
        let snapshot = status.snapshot();
        assert!(!snapshot.connected);
        assert!(snapshot.last_error.is_none());
        assert_eq!(snapshot.target_url, "http://remote/api");
    }

    #[test]
    fn test_failure_then_success() {
        let status = SharedRelayStatus::new("http://remote/api");

        assert_eq!(status.record_failure("connection refused"), 1);
        assert_eq!(status.record_failure("timeout"), 2);
        let snapshot = status.snapshot();
        assert!(!snapshot.connected);
        assert_eq!(snapshot.last_error.as_deref(), Some("timeout"));

        assert!(!status.record_success());
        let snapshot = status.snapshot();
        assert!(snapshot.connected);
        assert!(snapshot.last_error.is_none());
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.frames_delivered, 1);
        assert!(snapshot.last_success.is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let status = SharedRelayStatus::new("http://remote/api");
        let reader = status.clone();
        status.record_success();
        assert!(reader.snapshot().connected);

        status.mark_disconnected();
        assert!(!reader.snapshot().connected);
        assert_eq!(reader.snapshot().frames_delivered, 1);
    }
}
