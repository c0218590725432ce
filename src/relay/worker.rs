//! Background delivery loop.

use super::{RelayClient, RetryPolicy, SharedRelayStatus};
use crate::capture::LatestFrameBuffer;
use crate::encoding::StreamEncoder;
use crate::metrics::MetricsRegistry;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long an unchanged frame goes without being re-sent.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Forwards the latest frame to the remote endpoint once per tick.
pub struct RemoteRelay {
    client: RelayClient,
    buffer: LatestFrameBuffer,
    encoder: StreamEncoder,
    quality: u8,
    policy: RetryPolicy,
    status: SharedRelayStatus,
    metrics: MetricsRegistry,
    refresh_interval: Duration,
    last_delivered: Option<(u64, Instant)>,
    consecutive_failures: u32,
}

impl RemoteRelay {
    /// Creates a relay that reads `buffer` and reports into `status`.
    pub fn new(
        client: RelayClient,
        buffer: LatestFrameBuffer,
        quality: u8,
        policy: RetryPolicy,
        status: SharedRelayStatus,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            client,
            buffer,
            encoder: StreamEncoder::new(),
            quality,
            policy,
            status,
            metrics,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            last_delivered: None,
            consecutive_failures: 0,
        }
    }

    /// Overrides how often an unchanged frame is re-sent to keep the
    /// connectivity status current while the camera stalls.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Runs the loop on the tokio runtime until `session` is cancelled.
    pub fn spawn(self, session: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(session))
    }

    /// Delivery loop. Cancellation interrupts both the inter-tick sleep and
    /// an in-flight request.
    pub async fn run(mut self, session: CancellationToken) {
        tracing::info!(url = %self.client.stream_url(), "Relay started");

        loop {
            if session.is_cancelled() {
                break;
            }
            let tick_started = Instant::now();

            let Some(delay) = self.tick(&session).await else {
                break;
            };

            let wait = delay.saturating_sub(tick_started.elapsed());
            tokio::select! {
                biased;
                _ = session.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.status.mark_disconnected();
        tracing::info!(
            delivered = self.status.snapshot().frames_delivered,
            "Relay stopped"
        );
    }

    /// One iteration. Returns the delay before the next one, or `None`
    /// when cancelled mid-request.
    async fn tick(&mut self, session: &CancellationToken) -> Option<Duration> {
        let Some(frame) = self.buffer.read_latest() else {
            return Some(self.policy.interval);
        };
        if let Some((sequence, delivered_at)) = self.last_delivered {
            if sequence == frame.sequence() && delivered_at.elapsed() < self.refresh_interval {
                return Some(self.policy.interval);
            }
        }

        let chunk = match self.encoder.encode(&frame, self.quality) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    sequence = frame.sequence(),
                    "Skipping frame for relay"
                );
                self.metrics.record_encode_failure();
                return Some(self.policy.interval);
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = session.cancelled() => return None,
            outcome = self.client.post_frame(&chunk) => outcome,
        };

        match outcome {
            Ok(()) => {
                self.consecutive_failures = 0;
                self.last_delivered = Some((chunk.sequence, Instant::now()));
                self.metrics.record_delivery(true);
                if !self.status.record_success() {
                    tracing::info!(url = %self.client.stream_url(), "Relay connected");
                }
            }
            Err(e) => {
                self.metrics.record_delivery(false);
                let was_connected = self.status.snapshot().connected;
                self.consecutive_failures = self.status.record_failure(&e);
                if was_connected || self.consecutive_failures == 1 {
                    tracing::warn!(error = %e, "Relay delivery failed");
                } else {
                    tracing::debug!(
                        error = %e,
                        failures = self.consecutive_failures,
                        "Relay delivery failed"
                    );
                }
            }
        }

        Some(self.policy.delay_after(self.consecutive_failures))
    }
}
