//! Target discovery collaborator.
//!
//! The forwarding proxy exposes an HTTP listing of attached devices and
//! their debuggable pages. Discovery is a trait so the collection can be
//! driven by a test double; the production implementation polls the proxy.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::DeviceError;

/// One raw device/page record as the proxy reports it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTargetRecord {
    /// Identifier of the device the page lives on.
    pub device_id: String,
    /// Human-readable device name, when the proxy knows it.
    #[serde(default)]
    pub device_name: Option<String>,
    /// OS version reported by the device, when available. The proxy spells
    /// the key `deviceOSVersion`, not camel-case `deviceOsVersion`.
    #[serde(default, rename = "deviceOSVersion")]
    pub device_os_version: Option<String>,
    /// Page URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Page title.
    #[serde(default)]
    pub title: Option<String>,
    /// The locally-forwarded socket endpoint to debug this page.
    pub web_socket_debugger_url: String,
}

/// Lists the raw device/page records currently visible.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// One polling call. Implementations should not retry internally;
    /// the caller treats a failure as an empty cycle.
    async fn list_targets(&self) -> Result<Vec<RawTargetRecord>, DeviceError>;
}

/// Discovery against the forwarding proxy's HTTP listing endpoint.
pub struct HttpDiscovery {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDiscovery {
    /// Create a discovery client for `http://<host>:<port>`.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("http://{host}:{port}/json"),
        }
    }

    /// The listing URL polled by this client.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Discovery for HttpDiscovery {
    async fn list_targets(&self) -> Result<Vec<RawTargetRecord>, DeviceError> {
        let response = self.client.get(&self.endpoint).send().await?;
        let records: Vec<RawTargetRecord> = response.json().await?;
        tracing::debug!(count = records.len(), "discovery cycle complete");
        Ok(records)
    }
}
