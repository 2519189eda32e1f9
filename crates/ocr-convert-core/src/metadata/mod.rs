//! Run manifest and its persistence.

pub mod atomic;
mod manifest;

pub use atomic::atomic_write_json;
pub use manifest::{write_manifest, RunManifest};
