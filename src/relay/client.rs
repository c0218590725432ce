//! HTTP client for the remote ingestion endpoint.

use super::RelayConfig;
use crate::encoding::EncodedChunk;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a single delivery attempt.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// The request could not be sent or the response not read.
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    /// The endpoint answered with a status other than 200.
    #[error("remote endpoint answered {0}")]
    UnexpectedStatus(StatusCode),
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RelayError::Timeout
        } else {
            RelayError::Transport(e)
        }
    }
}

/// JSON body of a frame delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramePayload {
    /// Identifier of the stream on the remote side.
    pub stream_id: String,
    /// Base64 (standard alphabet, padded) JPEG bytes.
    pub frame: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

impl FramePayload {
    /// Builds a payload for `jpeg` stamped with the current time.
    pub fn new(stream_id: &str, jpeg: &[u8]) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            frame: BASE64.encode(jpeg),
            timestamp: epoch_seconds(),
        }
    }

    /// Decodes the JPEG bytes carried in `frame`.
    pub fn jpeg(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.frame)
    }
}

fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Sends frames and probes to the remote endpoint.
///
/// Every request carries the configured timeout.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    stream_url: String,
    status_url: String,
    stream_id: String,
}

impl RelayClient {
    /// Creates a client with the configured timeout.
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            stream_url: config.stream_url(),
            status_url: config.status_url(),
            stream_id: config.stream_id.clone(),
        })
    }

    /// URL frames are POSTed to.
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    /// POSTs one frame. Only HTTP 200 counts as delivered.
    pub async fn post_frame(&self, chunk: &EncodedChunk) -> Result<(), RelayError> {
        let payload = FramePayload::new(&self.stream_id, &chunk.data);
        let response = self.http.post(&self.stream_url).json(&payload).send().await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(RelayError::UnexpectedStatus(status)),
        }
    }

    /// Single GET against the status endpoint; true on HTTP 200.
    pub async fn check_server_connection(&self) -> bool {
        match self.http.get(&self.status_url).send().await {
            Ok(response) if response.status() == StatusCode::OK => true,
            Ok(response) => {
                tracing::debug!(
                    status = %response.status(),
                    url = %self.status_url,
                    "Status probe rejected"
                );
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, url = %self.status_url, "Status probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_payload_round_trips_jpeg() {
        let jpeg = [0xFFu8, 0xD8, 0x01, 0x02, 0xFF, 0xD9];
        let payload = FramePayload::new("cam", &jpeg);

        assert_eq!(payload.stream_id, "cam");
        assert_eq!(payload.jpeg().unwrap(), jpeg);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["stream_id"], "cam");
        assert!(json["frame"].is_string());
        assert!(json["timestamp"].is_f64());
    }

    #[test]
    fn test_payload_timestamp_is_now() {
        let before = chrono::Utc::now().timestamp() as f64;
        let payload = FramePayload::new("cam", b"x");
        let after = chrono::Utc::now().timestamp() as f64 + 1.0;
        assert!(payload.timestamp >= before && payload.timestamp <= after);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let config = RelayConfig {
            timeout_secs: 1,
            ..RelayConfig::for_base_url("http://127.0.0.1:9")
        };
        let client = RelayClient::new(&config).unwrap();

        assert!(!client.check_server_connection().await);

        let chunk = EncodedChunk {
            data: Bytes::from_static(b"jpeg"),
            quality: 80,
            width: 1,
            height: 1,
            sequence: 1,
        };
        assert!(client.post_frame(&chunk).await.is_err());
    }
}
