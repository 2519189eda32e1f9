//! Archive URL to local path mapping.

use std::path::{Path, PathBuf};

use super::extract::ArchiveKind;
use crate::{ConvertError, Result};

/// Local paths belonging to one archive URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub url: String,
    /// Downloaded archive file.
    pub archive_path: PathBuf,
    /// Directory the archive unpacks to.
    pub extracted_dir: PathBuf,
}

/// What is already present locally for an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Neither the archive nor its extracted directory exists.
    Missing,
    /// The archive exists but has not been unpacked.
    Downloaded,
    /// The extracted directory exists.
    Extracted,
}

/// Cache of downloaded and extracted archives inside one directory.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute the local paths for an archive URL.
    ///
    /// The archive keeps the last URL path segment as its file name and the
    /// extracted directory is that name without its archive extension.
    pub fn entry(&self, url: &str) -> Result<CachedArtifact> {
        let filename = archive_filename(url)?;
        let kind = ArchiveKind::from_filename(&filename).ok_or_else(|| {
            ConvertError::DownloadFailed {
                url: url.to_string(),
                message: format!("unsupported archive type: {filename}"),
            }
        })?;
        let stem = kind.strip_extension(&filename);

        Ok(CachedArtifact {
            url: url.to_string(),
            archive_path: self.root.join(&filename),
            extracted_dir: self.root.join(stem),
        })
    }

    /// Look up what already exists for `url`.
    pub fn lookup(&self, url: &str) -> Result<(CachedArtifact, CacheState)> {
        let entry = self.entry(url)?;
        let state = if entry.extracted_dir.is_dir() {
            CacheState::Extracted
        } else if entry.archive_path.is_file() {
            CacheState::Downloaded
        } else {
            CacheState::Missing
        };
        Ok((entry, state))
    }
}

fn archive_filename(url: &str) -> Result<String> {
    if url.trim().is_empty() {
        return Err(ConvertError::DownloadFailed {
            url: url.to_string(),
            message: "empty URL".to_string(),
        });
    }

    let parsed = url::Url::parse(url).map_err(|e| ConvertError::DownloadFailed {
        url: url.to_string(),
        message: format!("invalid URL: {e}"),
    })?;

    parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConvertError::DownloadFailed {
            url: url.to_string(),
            message: "URL has no file name".to_string(),
        })
}
