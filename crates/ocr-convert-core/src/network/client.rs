//! HTTP client wrapper.
//!
//! Requests are single-attempt with no timeout: a checkpoint download runs
//! to completion or fails.

use crate::config::NetworkConfig;
use crate::{ConvertError, Result};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

/// HTTP client used for archive downloads.
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client with the default user agent.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| ConvertError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self { client })
    }

    /// Wrap a preconfigured reqwest client, e.g. one with proxies disabled.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Make a GET request, failing on non-success status codes.
    pub async fn get(&self, url: &str) -> Result<Response> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ConvertError::Network {
                message: format!("GET {} failed: {}", url, e),
                source: Some(e),
            })?;

        Self::check_status(response.status(), url)?;
        Ok(response)
    }

    fn check_status(status: StatusCode, url: &str) -> Result<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(ConvertError::DownloadFailed {
                url: url.to_string(),
                message: format!("server responded with status {}", status),
            })
        }
    }
}
