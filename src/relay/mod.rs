//! Push relay to a remote ingestion endpoint.
//!
//! While the camera streams, [`RemoteRelay`] encodes the latest frame,
//! wraps it as base64 JSON and POSTs it to the configured endpoint.
//! Delivery failures are recorded in [`RelayStatus`] and never stop the
//! loop; repeated failures slow it down according to [`RetryPolicy`].

mod client;
mod config;
mod status;
mod worker;

pub use client::{FramePayload, RelayClient, RelayError};
pub use config::{RelayConfig, RetryPolicy};
pub use status::{RelayStatus, SharedRelayStatus};
pub use worker::{RemoteRelay, DEFAULT_REFRESH_INTERVAL};
