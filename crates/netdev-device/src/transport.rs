//! HTTP transport shared by the device clients.
//!
//! Every call opens its own connection: idle pooling is disabled so a call
//! never reuses a socket that went stale while the device rebooted.

use std::time::Duration;

use netdev_core::wire::DEADLINE_HEADER;
use netdev_core::{DeviceEndpoint, RpcCode, RpcStatus};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DeviceError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Content type of a client-streaming request body.
pub(crate) const NDJSON: &str = "application/x-ndjson";

#[derive(Debug, Clone)]
pub(crate) struct RpcTransport {
    client: reqwest::Client,
    endpoint: DeviceEndpoint,
    base_url: String,
}

impl RpcTransport {
    pub(crate) fn new(endpoint: DeviceEndpoint) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| DeviceError::Connect {
                endpoint: endpoint.to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self::with_client(client, endpoint))
    }

    pub(crate) fn with_client(client: reqwest::Client, endpoint: DeviceEndpoint) -> Self {
        let base_url = endpoint.base_url();
        Self {
            client,
            endpoint,
            base_url,
        }
    }

    pub(crate) const fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    /// Issue a unary call with a JSON body.
    pub(crate) async fn unary<Req, Resp>(
        &self,
        method: &'static str,
        request: &Req,
        timeout: Duration,
    ) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(request).map_err(|e| DeviceError::Decode {
            method,
            message: format!("failed to encode request: {e}"),
        })?;
        self.call(method, body, "application/json", timeout).await
    }

    /// Issue a call with a pre-encoded body and decode the single response.
    pub(crate) async fn call<Resp: DeserializeOwned>(
        &self,
        method: &'static str,
        body: Vec<u8>,
        content_type: &str,
        timeout: Duration,
    ) -> Result<Resp> {
        let url = format!("{}{method}", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(DEADLINE_HEADER, timeout.as_millis().to_string())
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_error(method, timeout, &e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(method, timeout, &e))?;

        if !status.is_success() {
            let status = serde_json::from_slice::<RpcStatus>(&bytes).unwrap_or_else(|_| {
                RpcStatus::new(
                    RpcCode::from_http_status(status.as_u16()),
                    format!("device returned status {status}"),
                )
            });
            tracing::debug!(
                endpoint = %self.endpoint,
                method,
                code = %status.code,
                message = %status.message,
                "Device call failed"
            );
            return Err(DeviceError::Remote { method, status });
        }

        let bytes = if bytes.iter().all(u8::is_ascii_whitespace) {
            &b"{}"[..]
        } else {
            &bytes[..]
        };
        serde_json::from_slice(bytes).map_err(|e| DeviceError::Decode {
            method,
            message: e.to_string(),
        })
    }

    fn transport_error(
        &self,
        method: &'static str,
        timeout: Duration,
        error: &reqwest::Error,
    ) -> DeviceError {
        if error.is_timeout() {
            DeviceError::Timeout {
                method,
                timeout_ms: timeout.as_millis(),
            }
        } else {
            DeviceError::Connect {
                endpoint: self.endpoint.to_string(),
                message: error.to_string(),
            }
        }
    }
}
