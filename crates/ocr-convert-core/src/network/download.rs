//! Streaming file download.
//!
//! The response body is written to `<destination>.part` and renamed into
//! place only after the stream finished, so a partially downloaded archive
//! never looks complete to the artifact cache.

use crate::config::NetworkConfig;
use crate::network::client::HttpClient;
use crate::{ConvertError, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Byte counts of a finished download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub bytes_downloaded: u64,
    /// From `Content-Length`, when the server sent one.
    pub total_bytes: Option<u64>,
}

/// Download manager for archive downloads.
pub struct DownloadManager {
    http: Arc<HttpClient>,
    temp_suffix: String,
}

impl DownloadManager {
    /// Create a new download manager.
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(Arc::new(HttpClient::new()?)))
    }

    /// Create a download manager with a custom HTTP client.
    pub fn with_client(http: Arc<HttpClient>) -> Self {
        Self {
            http,
            temp_suffix: NetworkConfig::DOWNLOAD_TEMP_SUFFIX.to_string(),
        }
    }

    /// Path the body is streamed to before the final rename.
    pub fn temp_path(&self, destination: &Path) -> PathBuf {
        PathBuf::from(format!("{}{}", destination.display(), self.temp_suffix))
    }

    /// Download `url` to `destination` in a single attempt.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<DownloadProgress> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConvertError::io("creating download directory", parent, e))?;
        }

        let temp_path = self.temp_path(destination);

        match self.do_download(url, &temp_path).await {
            Ok(progress) => {
                if let Err(e) = tokio::fs::rename(&temp_path, destination).await {
                    let _ = tokio::fs::remove_file(&temp_path).await;
                    return Err(ConvertError::io(
                        "moving download to final destination",
                        destination,
                        e,
                    ));
                }

                info!(
                    "Downloaded {} bytes to {}",
                    progress.bytes_downloaded,
                    destination.display()
                );
                Ok(progress)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                Err(e)
            }
        }
    }

    async fn do_download(&self, url: &str, temp_path: &Path) -> Result<DownloadProgress> {
        let response = self.http.get(url).await?;
        let total_bytes = response.content_length();

        let mut file = tokio::fs::File::create(temp_path)
            .await
            .map_err(|e| ConvertError::io("creating temp file", temp_path, e))?;

        let mut bytes_downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| ConvertError::DownloadFailed {
                url: url.to_string(),
                message: format!("error reading response body: {e}"),
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| ConvertError::io("writing temp file", temp_path, e))?;
            bytes_downloaded += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| ConvertError::io("flushing temp file", temp_path, e))?;

        if let Some(total) = total_bytes {
            if bytes_downloaded != total {
                return Err(ConvertError::DownloadFailed {
                    url: url.to_string(),
                    message: format!("received {bytes_downloaded} of {total} bytes"),
                });
            }
        }

        debug!("Finished streaming {} to {}", url, temp_path.display());
        Ok(DownloadProgress {
            bytes_downloaded,
            total_bytes,
        })
    }
}
