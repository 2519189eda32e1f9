//! Checkpoint archive fetching.
//!
//! [`ArtifactFetcher`] resolves an archive URL to an extracted checkpoint
//! directory inside a scratch directory. The [`ArtifactCache`] lookup makes
//! repeated fetches of the same URL no-ops, and the [`ArchiveSource`] seam
//! keeps the network out of tests.

mod cache;
mod extract;
mod fetcher;
mod source;

pub use cache::{ArtifactCache, CacheState, CachedArtifact};
pub use extract::{extract_archive, ArchiveKind};
pub use fetcher::ArtifactFetcher;
pub use source::{ArchiveSource, HttpArchiveSource};
