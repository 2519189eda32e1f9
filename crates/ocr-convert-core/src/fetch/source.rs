//! Where checkpoint archives come from.

use std::path::Path;

use crate::network::DownloadManager;
use crate::Result;

/// Retrieves an archive into a local file.
#[async_trait::async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Fetch `url` into `destination`. Called at most once per missing archive.
    async fn fetch_archive(&self, url: &str, destination: &Path) -> Result<()>;
}

/// Archive source backed by HTTP downloads.
pub struct HttpArchiveSource {
    downloads: DownloadManager,
}

impl HttpArchiveSource {
    pub fn new() -> Result<Self> {
        Ok(Self {
            downloads: DownloadManager::new()?,
        })
    }

    pub fn with_manager(downloads: DownloadManager) -> Self {
        Self { downloads }
    }
}

#[async_trait::async_trait]
impl ArchiveSource for HttpArchiveSource {
    async fn fetch_archive(&self, url: &str, destination: &Path) -> Result<()> {
        self.downloads.download(url, destination).await.map(|_| ())
    }
}
