//! Background capture loop.

use super::{CameraError, CameraFactory, CaptureConfig, FrameSource, LatestFrameBuffer};
use crate::metrics::MetricsRegistry;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Longest uninterrupted sleep between cancellation checks.
const CANCEL_POLL: Duration = Duration::from_millis(20);

/// Drives a [`FrameSource`] on a blocking thread for one streaming session.
pub struct CaptureWorker {
    factory: CameraFactory,
    config: CaptureConfig,
    buffer: LatestFrameBuffer,
    device_open: Arc<AtomicBool>,
    metrics: MetricsRegistry,
}

impl CaptureWorker {
    /// Creates a worker for one session.
    pub fn new(
        factory: CameraFactory,
        config: CaptureConfig,
        buffer: LatestFrameBuffer,
        device_open: Arc<AtomicBool>,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            factory,
            config,
            buffer,
            device_open,
            metrics,
        }
    }

    /// Spawns the loop. The receiver resolves once the device open attempt
    /// has finished; the task ends after `session` is cancelled and the
    /// device has been released.
    pub fn spawn(
        self,
        session: CancellationToken,
    ) -> (oneshot::Receiver<Result<(), CameraError>>, JoinHandle<()>) {
        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = tokio::task::spawn_blocking(move || self.run(session, ready_tx));
        (ready_rx, handle)
    }

    fn run(self, session: CancellationToken, ready: oneshot::Sender<Result<(), CameraError>>) {
        // The device handle is created here because it may not be `Send`.
        let mut source = FrameSource::new((self.factory)(), self.buffer.clone())
            .with_open_flag(Arc::clone(&self.device_open));

        if let Err(e) = source.open(&self.config) {
            let _ = ready.send(Err(e));
            return;
        }
        if ready.send(Ok(())).is_err() {
            tracing::debug!("Start request abandoned, releasing camera");
            return;
        }

        let interval = self.config.frame_interval();
        let mut captured: u64 = 0;

        while !session.is_cancelled() {
            let deadline = Instant::now() + interval;

            if source.capture_once().is_some() {
                captured += 1;
                self.metrics.record_capture();
            } else {
                self.metrics.record_capture_miss();
            }

            sleep_until(deadline, &session);
        }

        source.close();
        tracing::info!(frames = captured, "Capture loop stopped");
    }
}

fn sleep_until(deadline: Instant, session: &CancellationToken) {
    loop {
        if session.is_cancelled() {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        std::thread::sleep(remaining.min(CANCEL_POLL));
    }
}
