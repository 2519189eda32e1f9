//! Graph optimization strategies.
//!
//! [`OnnxRuntimeOptimizer`] fuses and quantizes graphs through the
//! onnxruntime Python tooling. [`CopyThroughOptimizer`] is used when that
//! tooling is not installed: it copies the graph verbatim and produces no
//! quantized variant. [`select_optimizer`] picks one at startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::pipeline;
use super::scripts::{self, TOOLING_PROBE};
use super::types::{megabytes, OptimizedArtifacts, ScriptProgressLine, SizeReport};
use crate::config::{ExternalTool, OptimizerSettings, PathsConfig};
use crate::{ConvertError, Result};

/// Produces an optimized (and possibly quantized) copy of an ONNX graph.
#[async_trait::async_trait]
pub trait GraphOptimizer: Send + Sync {
    /// Human-readable strategy name.
    fn name(&self) -> &str;

    /// Optimize `input` into `output`.
    async fn optimize(&self, input: &Path, output: &Path) -> Result<OptimizedArtifacts>;
}

/// Path of the quantized graph written next to an optimized graph:
/// `model_optimized.onnx` becomes `model_optimized_quantized.onnx`.
pub fn quantized_path_for(optimized: &Path) -> PathBuf {
    let stem = optimized
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    optimized.with_file_name(format!(
        "{}{}.{}",
        stem,
        PathsConfig::QUANTIZED_SUFFIX,
        PathsConfig::ONNX_EXTENSION
    ))
}

// ---------------------------------------------------------------------------
// onnxruntime
// ---------------------------------------------------------------------------

/// Optimize-and-quantize strategy backed by onnxruntime's Python tooling.
pub struct OnnxRuntimeOptimizer {
    python: ExternalTool,
    scripts_dir: PathBuf,
    settings: OptimizerSettings,
}

impl OnnxRuntimeOptimizer {
    /// `scripts_dir` receives the deployed optimizer script.
    pub fn new(python: ExternalTool, scripts_dir: PathBuf, settings: OptimizerSettings) -> Self {
        Self {
            python,
            scripts_dir,
            settings,
        }
    }

    fn log_script_progress(lines: &[String]) -> Option<String> {
        let mut error = None;
        for line in lines {
            match serde_json::from_str::<ScriptProgressLine>(line) {
                Ok(progress) if progress.stage == "error" => {
                    error = progress.message;
                }
                Ok(progress) => {
                    if let Some(message) = progress.message {
                        debug!("optimizer {}: {}", progress.stage, message);
                    } else if let Some(path) = progress.output_path {
                        debug!(
                            "optimizer {}: wrote {} ({} bytes)",
                            progress.stage,
                            path,
                            progress.output_size.unwrap_or_default()
                        );
                    }
                }
                Err(_) => debug!("Non-JSON optimizer output: {}", line),
            }
        }
        error
    }
}

#[async_trait::async_trait]
impl GraphOptimizer for OnnxRuntimeOptimizer {
    fn name(&self) -> &str {
        "onnxruntime"
    }

    async fn optimize(&self, input: &Path, output: &Path) -> Result<OptimizedArtifacts> {
        info!("Optimizing {}", input.display());

        let script = scripts::ensure_optimize_script(&self.scripts_dir)?;
        let quantized = quantized_path_for(output);
        let process_name = self.python.display_name();

        let mut cmd = self.python.command();
        cmd.arg(&script)
            .arg("--input")
            .arg(input)
            .arg("--output")
            .arg(output)
            .arg("--quantized-output")
            .arg(&quantized)
            .arg("--model-type")
            .arg(&self.settings.model_family)
            .arg("--num-heads")
            .arg(self.settings.num_heads.to_string())
            .arg("--hidden-size")
            .arg(self.settings.hidden_size.to_string())
            .arg("--weight-type")
            .arg(&self.settings.weight_type);

        let result = pipeline::run_captured(&mut cmd, &process_name)
            .await
            .map_err(|e| ConvertError::OptimizationFailed {
                message: format!("Failed to run {process_name}: {e}"),
            })?;

        let script_error = Self::log_script_progress(&result.stdout_lines);
        if let Some(message) = result.failure_message(&process_name) {
            return Err(ConvertError::OptimizationFailed {
                message: script_error.unwrap_or(message),
            });
        }

        for path in [output, quantized.as_path()] {
            if !path.is_file() {
                return Err(ConvertError::OptimizationFailed {
                    message: format!("optimizer did not write {}", path.display()),
                });
            }
        }

        match SizeReport::from_files(input, output, Some(&quantized)) {
            Ok(report) => log_size_report(&report),
            Err(e) => warn!("Could not compare model sizes: {}", e),
        }

        info!("Optimization complete: {}", output.display());
        info!("Quantized version: {}", quantized.display());

        Ok(OptimizedArtifacts {
            optimized: output.to_path_buf(),
            quantized: Some(quantized),
        })
    }
}

fn log_size_report(report: &SizeReport) {
    info!("Original: {:.2} MB", megabytes(report.original_bytes));
    info!(
        "Optimized: {:.2} MB ({:.1}% reduction)",
        megabytes(report.optimized_bytes),
        report.optimized_reduction()
    );
    if let (Some(bytes), Some(reduction)) = (report.quantized_bytes, report.quantized_reduction()) {
        info!(
            "Quantized: {:.2} MB ({:.1}% reduction)",
            megabytes(bytes),
            reduction
        );
    }
}

// ---------------------------------------------------------------------------
// Copy-through
// ---------------------------------------------------------------------------

/// Fallback strategy: the optimized graph is a byte copy of the input.
#[derive(Debug, Default)]
pub struct CopyThroughOptimizer;

#[async_trait::async_trait]
impl GraphOptimizer for CopyThroughOptimizer {
    fn name(&self) -> &str {
        "copy-through"
    }

    async fn optimize(&self, input: &Path, output: &Path) -> Result<OptimizedArtifacts> {
        tokio::fs::copy(input, output)
            .await
            .map_err(|e| ConvertError::io("copying unoptimized graph", output, e))?;
        info!(
            "Copied {} to {} without optimization",
            input.display(),
            output.display()
        );

        Ok(OptimizedArtifacts {
            optimized: output.to_path_buf(),
            quantized: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Probe for the onnxruntime tooling and pick a strategy.
///
/// Tooling that cannot be imported selects [`CopyThroughOptimizer`]; this is
/// never an error.
pub async fn select_optimizer(
    python: ExternalTool,
    scripts_dir: PathBuf,
    settings: OptimizerSettings,
) -> Arc<dyn GraphOptimizer> {
    let process_name = python.display_name();
    let mut cmd = python.command();
    cmd.args(["-c", TOOLING_PROBE]);

    let available = match pipeline::run_captured(&mut cmd, &process_name).await {
        Ok(output) => match output.failure_message(&process_name) {
            None => true,
            Some(message) => {
                debug!("Tooling probe failed: {}", message);
                false
            }
        },
        Err(e) => {
            debug!("Could not run {}: {}", process_name, e);
            false
        }
    };

    if available {
        info!("Using onnxruntime optimizer via {}", process_name);
        Arc::new(OnnxRuntimeOptimizer::new(python, scripts_dir, settings))
    } else {
        warn!(
            "onnxruntime optimization tools not available, optimized graphs will be plain copies"
        );
        warn!("Install with: pip install onnx onnxruntime");
        Arc::new(CopyThroughOptimizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_quantized_path_for() {
        assert_eq!(
            quantized_path_for(Path::new("/out/PP-OCRv5_mobile_det_optimized.onnx")),
            PathBuf::from("/out/PP-OCRv5_mobile_det_optimized_quantized.onnx")
        );
    }

    #[tokio::test]
    async fn test_copy_through_is_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("model.onnx");
        let output = temp_dir.path().join("model_optimized.onnx");
        std::fs::write(&input, b"\x08\x07graph-bytes").unwrap();

        let artifacts = CopyThroughOptimizer.optimize(&input, &output).await.unwrap();

        assert_eq!(artifacts.optimized, output);
        assert_eq!(artifacts.quantized, None);
        assert_eq!(std::fs::read(&input).unwrap(), std::fs::read(&output).unwrap());
        assert!(!quantized_path_for(&output).exists());
    }

    #[tokio::test]
    async fn test_copy_through_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let result = CopyThroughOptimizer
            .optimize(
                &temp_dir.path().join("missing.onnx"),
                &temp_dir.path().join("out.onnx"),
            )
            .await;
        assert!(matches!(result, Err(ConvertError::Io { .. })));
    }

    #[tokio::test]
    async fn test_select_missing_interpreter_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let optimizer = select_optimizer(
            ExternalTool::new("/nonexistent/python3"),
            temp_dir.path().to_path_buf(),
            OptimizerSettings::default(),
        )
        .await;
        assert_eq!(optimizer.name(), "copy-through");
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;

        /// Stands in for `python3 optimize_onnx.py ...`: copies the input to
        /// both outputs, or fails like the real script when `fail` is given.
        const FAKE_PYTHON: &str = r#"
shift
input=""; output=""; quantized=""
while [ $# -gt 0 ]; do
  case "$1" in
    --input) input="$2"; shift 2 ;;
    --output) output="$2"; shift 2 ;;
    --quantized-output) quantized="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if [ "$(cat "$input")" = "fail" ]; then
  echo '{"stage": "error", "message": "fusion pass crashed"}'
  exit 2
fi
printf 'optimized' > "$output"
printf 'q' > "$quantized"
echo '{"stage": "complete", "output_path": "'"$quantized"'", "output_size": 1}'
"#;

        fn fake_python(dir: &Path) -> ExternalTool {
            let script = dir.join("fake_python.sh");
            std::fs::write(&script, FAKE_PYTHON).unwrap();
            ExternalTool::new("sh").with_prefix_arg(script)
        }

        #[tokio::test]
        async fn test_onnxruntime_optimizer_writes_both_outputs() {
            let temp_dir = TempDir::new().unwrap();
            let input = temp_dir.path().join("m.onnx");
            let output = temp_dir.path().join("m_optimized.onnx");
            std::fs::write(&input, b"original-graph").unwrap();

            let optimizer = OnnxRuntimeOptimizer::new(
                fake_python(temp_dir.path()),
                temp_dir.path().join("scripts"),
                OptimizerSettings::default(),
            );
            let artifacts = optimizer.optimize(&input, &output).await.unwrap();

            assert_eq!(artifacts.optimized, output);
            let quantized = artifacts.quantized.unwrap();
            assert_eq!(quantized, temp_dir.path().join("m_optimized_quantized.onnx"));
            assert!(quantized.is_file());
            assert!(temp_dir.path().join("scripts").join("optimize_onnx.py").is_file());
        }

        #[tokio::test]
        async fn test_onnxruntime_optimizer_reports_script_error() {
            let temp_dir = TempDir::new().unwrap();
            let input = temp_dir.path().join("m.onnx");
            std::fs::write(&input, b"fail").unwrap();

            let optimizer = OnnxRuntimeOptimizer::new(
                fake_python(temp_dir.path()),
                temp_dir.path().join("scripts"),
                OptimizerSettings::default(),
            );
            let result = optimizer
                .optimize(&input, &temp_dir.path().join("m_optimized.onnx"))
                .await;

            match result {
                Err(ConvertError::OptimizationFailed { message }) => {
                    assert_eq!(message, "fusion pass crashed");
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_select_with_working_interpreter() {
            let temp_dir = TempDir::new().unwrap();
            let optimizer = select_optimizer(
                ExternalTool::new("true"),
                temp_dir.path().to_path_buf(),
                OptimizerSettings::default(),
            )
            .await;
            assert_eq!(optimizer.name(), "onnxruntime");
        }

        #[tokio::test]
        async fn test_select_with_failing_import_falls_back() {
            let temp_dir = TempDir::new().unwrap();
            let optimizer = select_optimizer(
                ExternalTool::new("false"),
                temp_dir.path().to_path_buf(),
                OptimizerSettings::default(),
            )
            .await;
            assert_eq!(optimizer.name(), "copy-through");
        }
    }
}
