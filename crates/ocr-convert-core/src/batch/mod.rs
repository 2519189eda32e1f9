//! Batch orchestration.
//!
//! [`BatchOrchestrator`] drives fetch, convert and optimize for every
//! requested token in order, isolating failures per model, and writes the
//! run manifest once at the end.

mod builder;
mod request;

pub use builder::{default_scripts_dir, BatchOrchestratorBuilder};
pub use request::BatchRequest;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::{ModelSpec, SourceCatalog};
use crate::config::{ConversionSettings, PathsConfig};
use crate::conversion::{
    ConversionResult, GraphConverter, GraphOptimizer, ModelStage, ProducedFiles,
};
use crate::fetch::{ArchiveSource, ArtifactFetcher};
use crate::metadata::{write_manifest, RunManifest};
use crate::progress::{BatchReport, ModelTracker};
use crate::{ConvertError, Result};

/// Runs conversion batches.
pub struct BatchOrchestrator {
    catalog: SourceCatalog,
    settings: ConversionSettings,
    source: Arc<dyn ArchiveSource>,
    converter: Arc<dyn GraphConverter>,
    optimizer: Arc<dyn GraphOptimizer>,
}

impl BatchOrchestrator {
    pub fn builder() -> BatchOrchestratorBuilder {
        BatchOrchestratorBuilder::new()
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    /// Name of the selected optimization strategy.
    pub fn optimizer_name(&self) -> &str {
        self.optimizer.name()
    }

    /// Process every token of `request` and write the manifest.
    ///
    /// Per-model failures are logged and reported; only failing to prepare
    /// the output directory or to write the manifest returns an error.
    pub async fn run(&self, request: &BatchRequest) -> Result<BatchReport> {
        let output_dir = request.output_dir.as_path();
        let scratch_dir = output_dir.join(PathsConfig::TEMP_DIR_NAME);

        tokio::fs::create_dir_all(&scratch_dir)
            .await
            .map_err(|e| ConvertError::io("creating output directory", &scratch_dir, e))?;

        let fetcher =
            ArtifactFetcher::new(self.source.clone()).skip_download(request.skip_download);
        let optimize = !request.skip_optimization && self.settings.enable_optimize;
        if !optimize {
            info!("Optimization stage disabled for this run");
        }

        let mut manifest = RunManifest::new(self.settings.clone());
        let mut outcomes = Vec::with_capacity(request.tokens.len());

        for token in &request.tokens {
            let mut tracker = ModelTracker::new(token.as_str());
            let result = self
                .process_model(token, &fetcher, &scratch_dir, output_dir, optimize, &mut tracker)
                .await;

            match result {
                Ok(entry) => {
                    manifest.record(entry);
                    outcomes.push(tracker.recorded());
                }
                Err(e) => outcomes.push(tracker.failed(&e)),
            }
        }

        let manifest_path = output_dir.join(PathsConfig::METADATA_FILENAME);
        let written = write_manifest(&manifest, &manifest_path);

        if request.keep_scratch {
            info!("Keeping temporary files in {}", scratch_dir.display());
        } else {
            info!("Cleaning up temporary files...");
            if let Err(e) = tokio::fs::remove_dir_all(&scratch_dir).await {
                warn!("Failed to remove {}: {}", scratch_dir.display(), e);
            }
        }
        written?;

        info!(
            "Conversion complete: {} of {} models recorded",
            manifest.len(),
            request.tokens.len()
        );

        Ok(BatchReport {
            output_dir: output_dir.to_path_buf(),
            manifest_path,
            outcomes,
        })
    }

    async fn process_model(
        &self,
        token: &str,
        fetcher: &ArtifactFetcher,
        scratch_dir: &Path,
        output_dir: &Path,
        optimize: bool,
        tracker: &mut ModelTracker,
    ) -> Result<ConversionResult> {
        let spec = ModelSpec::parse(token)?;
        let model_name = spec.model_name();
        tracker.set_model_name(model_name.as_str());
        let url = self.catalog.resolve(&spec)?;

        info!("Processing {}...", model_name);

        tracker.advance(ModelStage::Fetching);
        let checkpoint_dir = fetcher.fetch(url, scratch_dir).await?;

        tracker.advance(ModelStage::Converting);
        let onnx_name = format!("{}.{}", model_name, PathsConfig::ONNX_EXTENSION);
        let onnx_path = output_dir.join(&onnx_name);
        self.converter
            .convert(&checkpoint_dir, &onnx_path, spec.task_type(), &self.settings)
            .await?;

        let files = if optimize {
            tracker.advance(ModelStage::Optimizing);
            let optimized_path = output_dir.join(format!(
                "{}{}.{}",
                model_name,
                PathsConfig::OPTIMIZED_SUFFIX,
                PathsConfig::ONNX_EXTENSION
            ));
            let artifacts = self.optimizer.optimize(&onnx_path, &optimized_path).await?;

            ProducedFiles::Optimized {
                original_onnx: onnx_name,
                optimized_onnx: file_name(&artifacts.optimized),
                quantized_onnx: artifacts.quantized.as_deref().map(file_name),
            }
        } else {
            ProducedFiles::RawOnly { onnx: onnx_name }
        };

        verify_outputs(output_dir, &files)?;
        Ok(ConversionResult::new(&spec, files))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Every file named in a manifest entry must exist and be non-empty.
fn verify_outputs(output_dir: &Path, files: &ProducedFiles) -> Result<()> {
    for name in files.file_names() {
        let path = output_dir.join(name);
        let len = std::fs::metadata(&path)
            .map_err(|e| ConvertError::io("checking produced file", &path, e))?
            .len();
        if len == 0 {
            return Err(ConvertError::Io {
                message: format!("produced file {} is empty", path.display()),
                path: Some(path),
                source: None,
            });
        }
    }
    Ok(())
}
