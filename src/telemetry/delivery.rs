//! Delivery client. Hands a snapshot to the remote collector endpoint.
//!
//! One POST per call with a bounded timeout and no retry; the daemon's next
//! due tick is the retry. Failures are classified so the daemon can tell a
//! passing network problem from a broken configuration.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::domain::collector::Facts;
use crate::domain::identity::InstallationIdentity;
use crate::domain::types::TelemetryPayload;
use crate::error::DeliveryError;

pub const DEFAULT_ENDPOINT: &str = "https://telemetry.pleme.io/v1/report";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Delivery: Send + Sync {
    async fn send(
        &self,
        identity: &InstallationIdentity,
        snapshot: &Facts,
    ) -> Result<(), DeliveryError>;
}

pub struct HttpDelivery {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDelivery {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Delivery for HttpDelivery {
    async fn send(
        &self,
        identity: &InstallationIdentity,
        snapshot: &Facts,
    ) -> Result<(), DeliveryError> {
        let url = reqwest::Url::parse(&self.endpoint).map_err(|e| {
            DeliveryError::Fatal(format!("malformed endpoint '{}': {}", self.endpoint, e))
        })?;

        let payload = TelemetryPayload {
            identity: identity.clone(),
            facts: snapshot.clone(),
        };
        let body = serde_json::to_vec(&payload)
            .map_err(|e| DeliveryError::Fatal(format!("serializing payload: {}", e)))?;

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if status.is_success() {
            debug!(status = %status, keys = snapshot.len(), "telemetry delivered");
            return Ok(());
        }
        Err(classify_status(status))
    }
}

fn classify_request_error(err: reqwest::Error) -> DeliveryError {
    if err.is_builder() {
        DeliveryError::Fatal(format!("building request: {}", err))
    } else {
        DeliveryError::Transient(format!("sending telemetry: {}", err))
    }
}

fn classify_status(status: StatusCode) -> DeliveryError {
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        DeliveryError::Transient(format!("endpoint returned {}", status))
    } else {
        DeliveryError::Fatal(format!("endpoint rejected report with {}", status))
    }
}
