//! Idempotent fetch-and-unpack of checkpoint archives.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::cache::{ArtifactCache, CacheState};
use super::extract::extract_archive;
use super::source::ArchiveSource;
use crate::{ConvertError, Result};

/// Makes checkpoint archives available as extracted local directories.
pub struct ArtifactFetcher {
    source: Arc<dyn ArchiveSource>,
    skip_download: bool,
}

impl ArtifactFetcher {
    pub fn new(source: Arc<dyn ArchiveSource>) -> Self {
        Self {
            source,
            skip_download: false,
        }
    }

    /// Expect archives to be present already. Missing ones are still
    /// downloaded, with a warning.
    pub fn skip_download(mut self, skip: bool) -> Self {
        self.skip_download = skip;
        self
    }

    pub fn skips_download(&self) -> bool {
        self.skip_download
    }

    /// Ensure the archive at `url` is downloaded and extracted under
    /// `destination_dir`, returning the extracted directory.
    ///
    /// Each step is skipped when its output already exists, so repeated calls
    /// with the same arguments perform no further I/O.
    pub async fn fetch(&self, url: &str, destination_dir: &Path) -> Result<PathBuf> {
        let cache = ArtifactCache::new(destination_dir);
        let (entry, state) = cache.lookup(url)?;

        match state {
            CacheState::Extracted => {
                debug!("Using cached checkpoint {}", entry.extracted_dir.display());
                return Ok(entry.extracted_dir);
            }
            CacheState::Downloaded => {
                debug!("Using cached archive {}", entry.archive_path.display());
            }
            CacheState::Missing => {
                if self.skip_download {
                    warn!(
                        "{} not found locally, downloading despite --skip-download",
                        entry.archive_path.display()
                    );
                }
                tokio::fs::create_dir_all(destination_dir).await.map_err(|e| {
                    ConvertError::io("creating scratch directory", destination_dir, e)
                })?;

                info!("Downloading {}", url);
                self.source.fetch_archive(url, &entry.archive_path).await?;
            }
        }

        let archive_path = entry.archive_path.clone();
        let dest = destination_dir.to_path_buf();
        tokio::task::spawn_blocking(move || extract_archive(&archive_path, &dest))
            .await
            .map_err(|e| ConvertError::ExtractionFailed {
                archive: entry.archive_path.clone(),
                message: format!("extraction task failed: {e}"),
            })??;

        if !entry.extracted_dir.is_dir() {
            return Err(ConvertError::ExtractionFailed {
                archive: entry.archive_path,
                message: format!(
                    "archive did not contain the expected directory {}",
                    entry.extracted_dir.display()
                ),
            });
        }

        Ok(entry.extracted_dir)
    }
}
