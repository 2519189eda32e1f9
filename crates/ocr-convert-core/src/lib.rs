//! OCR Convert Core - Headless library for converting PaddleOCR checkpoints
//! to optimized ONNX graphs.
//!
//! A batch takes `<type>_<variant>` tokens such as `det_mobile`, fetches the
//! matching inference archives, converts them with `paddle2onnx`, optionally
//! fuses and quantizes the result, and writes a `models_metadata.json`
//! manifest describing every model that made it through.
//!
//! # Example
//!
//! ```rust,ignore
//! use ocr_convert_core::{BatchOrchestrator, BatchRequest};
//!
//! #[tokio::main]
//! async fn main() -> ocr_convert_core::Result<()> {
//!     let orchestrator = BatchOrchestrator::builder().build().await?;
//!     let request = BatchRequest::new("./onnx_models", ["det_mobile", "rec_mobile_en"]);
//!
//!     let report = orchestrator.run(&request).await?;
//!     println!("Recorded {} models", report.recorded().count());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod catalog;
pub mod config;
pub mod conversion;
pub mod error;
pub mod fetch;
pub mod metadata;
pub mod network;
pub mod progress;

// Re-export commonly used types
pub use batch::{BatchOrchestrator, BatchOrchestratorBuilder, BatchRequest};
pub use catalog::{ModelSpec, SourceCatalog, TaskType};
pub use config::{ConversionSettings, ExternalTool, OptimizerSettings};
pub use conversion::{
    ConversionResult, CopyThroughOptimizer, GraphConverter, GraphOptimizer, ModelStage,
    OnnxRuntimeOptimizer, Paddle2OnnxConverter, ProducedFiles,
};
pub use error::{ConvertError, Result};
pub use fetch::{ArchiveSource, ArtifactFetcher, HttpArchiveSource};
pub use metadata::RunManifest;
pub use progress::{BatchReport, ModelOutcome};
