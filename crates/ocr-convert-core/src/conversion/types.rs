//! Types for model conversion and optimization.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::{ModelSpec, TaskType};

/// Processing stage of one requested model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStage {
    /// Token accepted, nothing done yet
    Pending,
    /// Downloading and extracting the checkpoint archive
    Fetching,
    /// Running the graph converter
    Converting,
    /// Running the optimizer and quantizer
    Optimizing,
    /// Manifest entry created
    Recorded,
    /// Processing stopped with an error
    Failed,
}

impl fmt::Display for ModelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelStage::Pending => "pending",
            ModelStage::Fetching => "fetching",
            ModelStage::Converting => "converting",
            ModelStage::Optimizing => "optimizing",
            ModelStage::Recorded => "recorded",
            ModelStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Files produced for one model, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProducedFiles {
    /// Optimization stage ran.
    Optimized {
        original_onnx: String,
        optimized_onnx: String,
        /// Present only when a quantized graph was written.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quantized_onnx: Option<String>,
    },
    /// Optimization was disabled for the run.
    RawOnly { onnx: String },
}

impl ProducedFiles {
    /// All file names, raw graph first.
    pub fn file_names(&self) -> Vec<&str> {
        match self {
            ProducedFiles::RawOnly { onnx } => vec![onnx.as_str()],
            ProducedFiles::Optimized {
                original_onnx,
                optimized_onnx,
                quantized_onnx,
            } => {
                let mut names = vec![original_onnx.as_str(), optimized_onnx.as_str()];
                if let Some(q) = quantized_onnx {
                    names.push(q.as_str());
                }
                names
            }
        }
    }

    pub fn quantized(&self) -> Option<&str> {
        match self {
            ProducedFiles::Optimized { quantized_onnx, .. } => quantized_onnx.as_deref(),
            ProducedFiles::RawOnly { .. } => None,
        }
    }
}

/// Manifest entry for one successfully processed model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    #[serde(skip)]
    pub model_name: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub variant: String,
    #[serde(flatten)]
    pub files: ProducedFiles,
}

impl ConversionResult {
    pub fn new(spec: &ModelSpec, files: ProducedFiles) -> Self {
        Self {
            model_name: spec.model_name(),
            task_type: spec.task_type(),
            variant: spec.variant().to_string(),
            files,
        }
    }
}

/// Output of a [`GraphOptimizer`](super::GraphOptimizer) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedArtifacts {
    pub optimized: PathBuf,
    /// `None` when no quantized graph was produced.
    pub quantized: Option<PathBuf>,
}

/// File sizes of the original, optimized and quantized graphs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeReport {
    pub original_bytes: u64,
    pub optimized_bytes: u64,
    pub quantized_bytes: Option<u64>,
}

impl SizeReport {
    pub fn from_files(
        original: &Path,
        optimized: &Path,
        quantized: Option<&Path>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            original_bytes: std::fs::metadata(original)?.len(),
            optimized_bytes: std::fs::metadata(optimized)?.len(),
            quantized_bytes: match quantized {
                Some(path) => Some(std::fs::metadata(path)?.len()),
                None => None,
            },
        })
    }

    /// Percentage by which the optimized graph is smaller than the original.
    pub fn optimized_reduction(&self) -> f64 {
        reduction_percent(self.original_bytes, self.optimized_bytes)
    }

    pub fn quantized_reduction(&self) -> Option<f64> {
        self.quantized_bytes
            .map(|q| reduction_percent(self.original_bytes, q))
    }
}

fn reduction_percent(original: u64, new: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (1.0 - new as f64 / original as f64) * 100.0
}

/// Size in megabytes for log output.
pub(crate) fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// JSON progress line emitted by the optimizer script on stdout.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptProgressLine {
    pub stage: String,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub output_size: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}
