//! PaddlePaddle to ONNX graph conversion via `paddle2onnx`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;

use super::pipeline;
use super::shape::InputShape;
use crate::catalog::TaskType;
use crate::config::{CheckpointConfig, ConversionSettings, ExternalTool, ToolDefaults};
use crate::{ConvertError, Result};

/// Converts a source checkpoint directory into a single ONNX graph file.
#[async_trait::async_trait]
pub trait GraphConverter: Send + Sync {
    /// Convert the checkpoint in `source_dir` to `output_path`.
    ///
    /// The input shape is selected from `task`.
    async fn convert(
        &self,
        source_dir: &Path,
        output_path: &Path,
        task: TaskType,
        settings: &ConversionSettings,
    ) -> Result<PathBuf>;
}

/// Converter backed by the `paddle2onnx` command line tool.
pub struct Paddle2OnnxConverter {
    tool: ExternalTool,
}

impl Paddle2OnnxConverter {
    pub fn new(tool: ExternalTool) -> Self {
        Self { tool }
    }

    /// Build the tool arguments for one conversion.
    pub fn build_args(
        model_dir: &Path,
        output_path: &Path,
        task: TaskType,
        settings: &ConversionSettings,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--model_dir".into(),
            model_dir.into(),
            "--model_filename".into(),
            CheckpointConfig::MODEL_FILENAME.into(),
            "--params_filename".into(),
            CheckpointConfig::PARAMS_FILENAME.into(),
            "--save_file".into(),
            output_path.into(),
            "--opset_version".into(),
            settings.opset_version.to_string().into(),
            "--deploy_backend".into(),
            settings.deploy_backend.clone().into(),
        ];

        if settings.enable_onnx_checker {
            args.push("--enable_onnx_checker".into());
        }
        if settings.enable_auto_update_opset {
            args.push("--enable_auto_update_opset".into());
        }

        args.push("--input_shape_dict".into());
        args.push(InputShape::for_task(task).to_shape_dict().into());
        args
    }
}

impl Default for Paddle2OnnxConverter {
    fn default() -> Self {
        Self::new(ExternalTool::new(ToolDefaults::PADDLE2ONNX))
    }
}

#[async_trait::async_trait]
impl GraphConverter for Paddle2OnnxConverter {
    async fn convert(
        &self,
        source_dir: &Path,
        output_path: &Path,
        task: TaskType,
        settings: &ConversionSettings,
    ) -> Result<PathBuf> {
        let model_dir = locate_checkpoint_dir(source_dir)?;
        let process_name = self.tool.display_name();

        info!(
            "Converting {} model {} to ONNX",
            task.long_name(),
            model_dir.display()
        );

        let mut cmd = self.tool.command();
        cmd.args(Self::build_args(&model_dir, output_path, task, settings));

        let output = pipeline::run_captured(&mut cmd, &process_name)
            .await
            .map_err(|e| ConvertError::ConversionFailed {
                message: format!("Failed to run {process_name}: {e}"),
            })?;

        if let Some(message) = output.failure_message(&process_name) {
            return Err(ConvertError::ConversionFailed { message });
        }

        if !output_path.is_file() {
            return Err(ConvertError::ConversionFailed {
                message: format!(
                    "{process_name} reported success but {} was not written",
                    output_path.display()
                ),
            });
        }

        info!("Successfully converted to {}", output_path.display());
        Ok(output_path.to_path_buf())
    }
}

fn is_checkpoint_dir(dir: &Path) -> bool {
    dir.join(CheckpointConfig::MODEL_FILENAME).is_file()
        && dir.join(CheckpointConfig::PARAMS_FILENAME).is_file()
}

/// Find the directory holding the graph and parameter files.
///
/// Archives normally unpack straight into `source_dir`; a single nested
/// checkpoint directory is accepted too.
pub(crate) fn locate_checkpoint_dir(source_dir: &Path) -> Result<PathBuf> {
    if is_checkpoint_dir(source_dir) {
        return Ok(source_dir.to_path_buf());
    }

    let candidates: Vec<PathBuf> = WalkDir::new(source_dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir() && is_checkpoint_dir(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    match candidates.as_slice() {
        [single] => Ok(single.clone()),
        [] => Err(ConvertError::ConversionFailed {
            message: format!(
                "No {} and {} found in {}",
                CheckpointConfig::MODEL_FILENAME,
                CheckpointConfig::PARAMS_FILENAME,
                source_dir.display()
            ),
        }),
        _ => Err(ConvertError::ConversionFailed {
            message: format!(
                "Multiple checkpoints found in {}",
                source_dir.display()
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_checkpoint(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(CheckpointConfig::MODEL_FILENAME), b"graph").unwrap();
        std::fs::write(dir.join(CheckpointConfig::PARAMS_FILENAME), b"weights").unwrap();
    }

    fn arg_after<'a>(args: &'a [OsString], flag: &str) -> Option<&'a OsString> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
    }

    #[test]
    fn test_build_args_detection() {
        let settings = ConversionSettings::default();
        let args = Paddle2OnnxConverter::build_args(
            Path::new("/scratch/det"),
            Path::new("/out/det.onnx"),
            TaskType::Detection,
            &settings,
        );

        assert_eq!(arg_after(&args, "--model_dir").unwrap(), "/scratch/det");
        assert_eq!(arg_after(&args, "--model_filename").unwrap(), "inference.pdmodel");
        assert_eq!(arg_after(&args, "--params_filename").unwrap(), "inference.pdiparams");
        assert_eq!(arg_after(&args, "--save_file").unwrap(), "/out/det.onnx");
        assert_eq!(arg_after(&args, "--opset_version").unwrap(), "11");
        assert_eq!(arg_after(&args, "--deploy_backend").unwrap(), "onnxruntime");
        assert_eq!(
            arg_after(&args, "--input_shape_dict").unwrap(),
            r#"{"x": [-1, 3, -1, -1]}"#
        );
        assert!(args.iter().any(|a| a == "--enable_onnx_checker"));
        assert!(args.iter().any(|a| a == "--enable_auto_update_opset"));
    }

    #[test]
    fn test_build_args_recognition_without_flags() {
        let settings = ConversionSettings {
            enable_onnx_checker: false,
            enable_auto_update_opset: false,
            ..Default::default()
        };
        let args = Paddle2OnnxConverter::build_args(
            Path::new("/scratch/rec"),
            Path::new("/out/rec.onnx"),
            TaskType::Recognition,
            &settings,
        );

        assert_eq!(
            arg_after(&args, "--input_shape_dict").unwrap(),
            r#"{"x": [-1, 3, 48, -1]}"#
        );
        assert!(!args.iter().any(|a| a == "--enable_onnx_checker"));
        assert!(!args.iter().any(|a| a == "--enable_auto_update_opset"));
    }

    #[test]
    fn test_locate_checkpoint_dir() {
        let temp_dir = TempDir::new().unwrap();
        write_checkpoint(temp_dir.path());
        assert_eq!(locate_checkpoint_dir(temp_dir.path()).unwrap(), temp_dir.path());

        let nested = TempDir::new().unwrap();
        write_checkpoint(&nested.path().join("inner"));
        assert_eq!(
            locate_checkpoint_dir(nested.path()).unwrap(),
            nested.path().join("inner")
        );
    }

    #[test]
    fn test_locate_checkpoint_dir_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(CheckpointConfig::MODEL_FILENAME), b"graph").unwrap();
        assert!(matches!(
            locate_checkpoint_dir(temp_dir.path()),
            Err(ConvertError::ConversionFailed { .. })
        ));
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;

        /// Shell shim standing in for paddle2onnx: writes the `--save_file`
        /// target, or fails when the model dir contains a `fail` marker.
        const FAKE_PADDLE2ONNX: &str = r#"
model_dir=""
save_file=""
while [ $# -gt 0 ]; do
  case "$1" in
    --model_dir) model_dir="$2"; shift 2 ;;
    --save_file) save_file="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if [ -f "$model_dir/fail" ]; then
  echo "Paddle model conversion error" >&2
  exit 1
fi
printf 'onnx-graph' > "$save_file"
"#;

        fn fake_tool(dir: &Path) -> ExternalTool {
            let script = dir.join("fake_paddle2onnx.sh");
            std::fs::write(&script, FAKE_PADDLE2ONNX).unwrap();
            ExternalTool::new("sh").with_prefix_arg(script)
        }

        #[tokio::test]
        async fn test_convert_success() {
            let temp_dir = TempDir::new().unwrap();
            let checkpoint = temp_dir.path().join("det_infer");
            write_checkpoint(&checkpoint);
            let output = temp_dir.path().join("det.onnx");

            let converter = Paddle2OnnxConverter::new(fake_tool(temp_dir.path()));
            let result = converter
                .convert(&checkpoint, &output, TaskType::Detection, &ConversionSettings::default())
                .await
                .unwrap();

            assert_eq!(result, output);
            assert_eq!(std::fs::read(&output).unwrap(), b"onnx-graph");
        }

        #[tokio::test]
        async fn test_convert_failure_carries_stderr() {
            let temp_dir = TempDir::new().unwrap();
            let checkpoint = temp_dir.path().join("rec_infer");
            write_checkpoint(&checkpoint);
            std::fs::write(checkpoint.join("fail"), b"").unwrap();

            let converter = Paddle2OnnxConverter::new(fake_tool(temp_dir.path()));
            let result = converter
                .convert(
                    &checkpoint,
                    &temp_dir.path().join("rec.onnx"),
                    TaskType::Recognition,
                    &ConversionSettings::default(),
                )
                .await;

            match result {
                Err(ConvertError::ConversionFailed { message }) => {
                    assert!(message.contains("Paddle model conversion error"), "{message}");
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_convert_missing_tool() {
            let temp_dir = TempDir::new().unwrap();
            let checkpoint = temp_dir.path().join("det_infer");
            write_checkpoint(&checkpoint);

            let converter =
                Paddle2OnnxConverter::new(ExternalTool::new("/nonexistent/paddle2onnx"));
            let result = converter
                .convert(
                    &checkpoint,
                    &temp_dir.path().join("det.onnx"),
                    TaskType::Detection,
                    &ConversionSettings::default(),
                )
                .await;
            assert!(matches!(result, Err(ConvertError::ConversionFailed { .. })));
        }
    }
}
