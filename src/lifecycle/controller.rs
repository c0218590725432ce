//! Start/stop state machine for the camera and its background tasks.

use crate::capture::{CameraError, CameraFactory, CaptureConfig, CaptureWorker, LatestFrameBuffer};
use crate::metrics::MetricsRegistry;
use crate::relay::{
    RelayClient, RelayConfig, RelayError, RelayStatus, RemoteRelay, RetryPolicy,
    SharedRelayStatus,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default bound on how long `stop` waits for each background task.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle state of the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamingState {
    /// No device is open and no task is running.
    Stopped,
    /// A device open attempt is in progress.
    Starting,
    /// The capture task holds the device and frames are flowing.
    Streaming,
}

/// Errors returned by [`CameraLifecycleController::start`].
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The device could not be opened.
    #[error("camera failed to start: {0}")]
    Open(#[from] CameraError),
    /// The previous capture task has not released the device yet.
    #[error("camera is still being released by the previous session")]
    DeviceBusy,
    /// The capture task ended unexpectedly.
    #[error("capture task failed: {0}")]
    CaptureTask(String),
}

/// Point-in-time view of the lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct CameraStatus {
    /// Current lifecycle state.
    pub state: StreamingState,
    /// Shorthand for `state == Streaming`.
    pub is_streaming: bool,
    /// Whether the capture task currently holds the device open.
    pub camera_available: bool,
    /// Present when the relay is enabled.
    pub relay: Option<RelayStatus>,
}

#[derive(Debug, Clone)]
struct Phase {
    state: StreamingState,
    session: Option<CancellationToken>,
}

impl Phase {
    fn stopped() -> Self {
        Self {
            state: StreamingState::Stopped,
            session: None,
        }
    }
}

#[derive(Default)]
struct Tasks {
    capture: Option<JoinHandle<()>>,
    relay: Option<JoinHandle<()>>,
}

struct RelayParts {
    client: RelayClient,
    policy: RetryPolicy,
    status: SharedRelayStatus,
}

/// Cancels the session and resets the phase to `Stopped` if a start
/// attempt is abandoned midway.
struct StartGuard<'a> {
    phase: &'a watch::Sender<Phase>,
    session: CancellationToken,
    armed: bool,
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.session.cancel();
            self.phase.send_replace(Phase::stopped());
        }
    }
}

/// Owns the camera lifecycle for the process.
///
/// Constructed once in `main` and shared behind an `Arc`. Transitions are
/// serialized by an async mutex, so at most one device open attempt runs
/// at a time; state reads never wait on a transition.
pub struct CameraLifecycleController {
    config: CaptureConfig,
    factory: CameraFactory,
    buffer: LatestFrameBuffer,
    relay: Option<RelayParts>,
    metrics: MetricsRegistry,
    device_open: Arc<AtomicBool>,
    phase: watch::Sender<Phase>,
    tasks: Mutex<Tasks>,
    stop_timeout: Duration,
}

impl CameraLifecycleController {
    /// Creates a stopped controller without a relay.
    pub fn new(config: CaptureConfig, factory: CameraFactory, metrics: MetricsRegistry) -> Self {
        let (phase, _) = watch::channel(Phase::stopped());
        Self {
            config,
            factory,
            buffer: LatestFrameBuffer::new(),
            relay: None,
            metrics,
            device_open: Arc::new(AtomicBool::new(false)),
            phase,
            tasks: Mutex::new(Tasks::default()),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Enables the remote relay. A disabled `config` leaves it off.
    pub fn with_relay(mut self, config: &RelayConfig) -> Result<Self, RelayError> {
        if config.enabled {
            self.relay = Some(RelayParts {
                client: RelayClient::new(config)?,
                policy: config.retry_policy(),
                status: SharedRelayStatus::new(config.stream_url()),
            });
        }
        Ok(self)
    }

    /// Overrides how long `stop` waits for each background task.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// The buffer the capture task publishes into.
    pub fn buffer(&self) -> &LatestFrameBuffer {
        &self.buffer
    }

    /// Capture settings used for every session.
    pub fn capture_config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Client for the remote endpoint, when the relay is enabled.
    pub fn relay_client(&self) -> Option<&RelayClient> {
        self.relay.as_ref().map(|relay| &relay.client)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamingState {
        self.phase.borrow().state
    }

    /// Cancellation token of the running session, if streaming.
    ///
    /// The token is cancelled when the session stops.
    pub fn session(&self) -> Option<CancellationToken> {
        let phase = self.phase.borrow();
        match phase.state {
            StreamingState::Streaming => phase.session.clone(),
            _ => None,
        }
    }

    /// Snapshot of the lifecycle and relay state.
    pub fn status(&self) -> CameraStatus {
        let state = self.state();
        CameraStatus {
            state,
            is_streaming: state == StreamingState::Streaming,
            camera_available: self.device_open.load(Ordering::SeqCst),
            relay: self.relay.as_ref().map(|relay| relay.status.snapshot()),
        }
    }

    /// Opens the camera and launches the background tasks.
    ///
    /// Succeeds without doing anything when already streaming.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        let mut tasks = self.tasks.lock().await;
        if self.state() == StreamingState::Streaming {
            return Ok(());
        }

        // A previous session, or an abandoned start, may still hold the
        // device.
        if let Some(mut previous) = tasks.capture.take() {
            if tokio::time::timeout(self.stop_timeout, &mut previous)
                .await
                .is_err()
            {
                tasks.capture = Some(previous);
                return Err(LifecycleError::DeviceBusy);
            }
            // It may have published a frame after the last stop cleared
            // the buffer.
            self.buffer.clear();
        }

        self.phase.send_replace(Phase {
            state: StreamingState::Starting,
            session: None,
        });
        let session = CancellationToken::new();
        let mut guard = StartGuard {
            phase: &self.phase,
            session: session.clone(),
            armed: true,
        };
        tracing::info!(device = self.config.device_id, "Starting camera");

        let worker = CaptureWorker::new(
            Arc::clone(&self.factory),
            self.config.clone(),
            self.buffer.clone(),
            Arc::clone(&self.device_open),
            self.metrics.clone(),
        );
        let (ready, capture) = worker.spawn(session.clone());
        // Stored before waiting so the next start waits for this task even
        // if the current call is dropped mid-open.
        tasks.capture = Some(capture);

        let opened = match ready.await {
            Ok(result) => result.map_err(LifecycleError::from),
            Err(_) => Err(LifecycleError::CaptureTask(
                "capture task exited before opening the camera".into(),
            )),
        };
        if let Err(e) = opened {
            if let Some(capture) = tasks.capture.take() {
                let _ = capture.await;
            }
            tracing::warn!(error = %e, "Camera failed to start");
            return Err(e);
        }

        if let Some(relay) = &self.relay {
            let worker = RemoteRelay::new(
                relay.client.clone(),
                self.buffer.clone(),
                self.config.quality,
                relay.policy,
                relay.status.clone(),
                self.metrics.clone(),
            );
            tasks.relay = Some(worker.spawn(session.clone()));
        }

        guard.armed = false;
        self.phase.send_replace(Phase {
            state: StreamingState::Streaming,
            session: Some(session),
        });
        tracing::info!("Camera streaming");
        Ok(())
    }

    /// Signals every loop to exit, waits (bounded) for the relay and the
    /// capture task, and releases the device. Does nothing when stopped.
    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        let phase = self.phase.borrow().clone();
        if phase.state == StreamingState::Stopped {
            return;
        }

        if let Some(session) = phase.session {
            session.cancel();
        }

        if let Some(mut relay) = tasks.relay.take() {
            if tokio::time::timeout(self.stop_timeout, &mut relay)
                .await
                .is_err()
            {
                tracing::warn!(
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "Relay did not stop in time, aborting it"
                );
                relay.abort();
            }
        }

        if let Some(mut capture) = tasks.capture.take() {
            if tokio::time::timeout(self.stop_timeout, &mut capture)
                .await
                .is_err()
            {
                tracing::warn!("Camera is still being released");
                tasks.capture = Some(capture);
            }
        }

        self.buffer.clear();
        self.phase.send_replace(Phase::stopped());
        tracing::info!("Camera stopped");
    }
}
