//! Network utilities for fetching checkpoint archives.
//!
//! This module provides:
//! - HTTP client wrapper with a fixed user agent
//! - Download manager that streams to a temp file and renames on success

mod client;
mod download;

pub use client::HttpClient;
pub use download::{DownloadManager, DownloadProgress};
