//! Centralized configuration for the conversion pipeline.
//!
//! Constant groups for paths, networking and external tools, plus the
//! serializable settings that govern every conversion in a run.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::IoResultExt;
use crate::{ConvertError, Result};

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "ocr-convert";
    /// Release label written into the manifest and used as model name prefix.
    pub const MODEL_RELEASE: &'static str = "PP-OCRv5";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const USER_AGENT: &'static str = "ocr-convert/0.1";
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
}

/// Output directory layout.
pub struct PathsConfig;

impl PathsConfig {
    pub const TEMP_DIR_NAME: &'static str = "temp";
    pub const METADATA_FILENAME: &'static str = "models_metadata.json";
    pub const SCRIPTS_DIR_NAME: &'static str = "scripts";
    pub const ONNX_EXTENSION: &'static str = "onnx";
    pub const OPTIMIZED_SUFFIX: &'static str = "_optimized";
    pub const QUANTIZED_SUFFIX: &'static str = "_quantized";
}

/// Checkpoint file naming convention of the source framework.
pub struct CheckpointConfig;

impl CheckpointConfig {
    pub const MODEL_FILENAME: &'static str = "inference.pdmodel";
    pub const PARAMS_FILENAME: &'static str = "inference.pdiparams";
    /// Name of the graph input the shape dictionary applies to.
    pub const INPUT_NAME: &'static str = "x";
}

/// Default program names for the external tools.
pub struct ToolDefaults;

impl ToolDefaults {
    pub const PADDLE2ONNX: &'static str = "paddle2onnx";
    pub const PYTHON: &'static str = "python3";
}

/// Settings passed to the graph converter and recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    /// Target ONNX opset version.
    pub opset_version: u32,
    pub enable_onnx_checker: bool,
    pub enable_auto_update_opset: bool,
    /// Runtime the converted graph is tuned for.
    pub deploy_backend: String,
    /// Keep weights in a separate file instead of one self-contained graph.
    pub save_external_data: bool,
    /// Run the optimization stage after conversion.
    pub enable_optimize: bool,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            opset_version: 11,
            enable_onnx_checker: true,
            enable_auto_update_opset: true,
            deploy_backend: "onnxruntime".to_string(),
            save_external_data: false,
            enable_optimize: true,
        }
    }
}

impl ConversionSettings {
    /// Load settings from a JSON file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).with_path(path)?;
        let settings: Self = serde_json::from_str(&contents).map_err(|e| ConvertError::Json {
            message: format!("Failed to parse {}: {}", path.display(), e),
            source: Some(e),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.opset_version == 0 {
            return Err(ConvertError::Config {
                message: "opset_version must be greater than zero".to_string(),
            });
        }
        if self.deploy_backend.trim().is_empty() {
            return Err(ConvertError::Config {
                message: "deploy_backend must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Pass configuration for the onnxruntime optimizer and quantizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Model family whose registered fusion passes are applied.
    pub model_family: String,
    /// Attention head count, 0 lets the optimizer detect it.
    pub num_heads: u32,
    /// Hidden size, 0 lets the optimizer detect it.
    pub hidden_size: u32,
    /// Quantized weight type (`QUInt8` or `QInt8`).
    pub weight_type: String,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            model_family: "bert".to_string(),
            num_heads: 0,
            hidden_size: 0,
            weight_type: "QUInt8".to_string(),
        }
    }
}

/// An external program plus arguments placed before the per-call arguments.
///
/// Lets a tool be a plain executable (`paddle2onnx`), a module run through an
/// interpreter (`python3 -m paddle2onnx`) or a shell shim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    pub program: PathBuf,
    pub prefix_args: Vec<OsString>,
}

impl ExternalTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    pub fn with_prefix_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.prefix_args.push(arg.into());
        self
    }

    /// Start a `tokio` command with the program and its prefix arguments.
    pub fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.prefix_args);
        cmd
    }

    /// Program name for log and error messages.
    pub fn display_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = ConversionSettings::default();
        assert_eq!(settings.opset_version, 11);
        assert!(settings.enable_onnx_checker);
        assert!(settings.enable_auto_update_opset);
        assert_eq!(settings.deploy_backend, "onnxruntime");
        assert!(!settings.save_external_data);
        assert!(settings.enable_optimize);
    }

    #[test]
    fn test_load_partial_settings() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"opset_version": 14, "enable_optimize": false}"#).unwrap();

        let settings = ConversionSettings::load(&path).unwrap();
        assert_eq!(settings.opset_version, 14);
        assert!(!settings.enable_optimize);
        assert_eq!(settings.deploy_backend, "onnxruntime");
    }

    #[test]
    fn test_load_rejects_invalid_settings() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"deploy_backend": "  "}"#).unwrap();

        assert!(matches!(
            ConversionSettings::load(&path),
            Err(ConvertError::Config { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ConversionSettings::load(Path::new("/nonexistent/settings.json"));
        assert!(matches!(result, Err(ConvertError::Io { .. })));
    }

    #[test]
    fn test_external_tool_display_name() {
        let tool = ExternalTool::new("/usr/local/bin/paddle2onnx");
        assert_eq!(tool.display_name(), "paddle2onnx");

        let tool = ExternalTool::new("python3").with_prefix_arg("-m");
        assert_eq!(tool.prefix_args, vec![OsString::from("-m")]);
    }
}
