//! Builder for configuring a [`BatchOrchestrator`].

use std::sync::Arc;

use super::BatchOrchestrator;
use crate::catalog::SourceCatalog;
use crate::config::{
    AppConfig, ConversionSettings, ExternalTool, OptimizerSettings, PathsConfig, ToolDefaults,
};
use crate::conversion::{select_optimizer, GraphConverter, GraphOptimizer, Paddle2OnnxConverter};
use crate::fetch::{ArchiveSource, HttpArchiveSource};
use crate::Result;

/// Builder for [`BatchOrchestrator`].
///
/// Every collaborator can be replaced; unset ones fall back to the
/// production implementations.
///
/// # Example
///
/// ```rust,ignore
/// use ocr_convert_core::{BatchOrchestrator, BatchRequest};
///
/// let orchestrator = BatchOrchestrator::builder().build().await?;
/// let report = orchestrator
///     .run(&BatchRequest::new("./onnx_models", ["det_mobile", "rec_mobile_en"]))
///     .await?;
/// ```
#[derive(Default)]
pub struct BatchOrchestratorBuilder {
    catalog: Option<SourceCatalog>,
    settings: Option<ConversionSettings>,
    source: Option<Arc<dyn ArchiveSource>>,
    converter: Option<Arc<dyn GraphConverter>>,
    optimizer: Option<Arc<dyn GraphOptimizer>>,
}

impl BatchOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default: [`SourceCatalog::pp_ocr_v4`].
    pub fn catalog(mut self, catalog: SourceCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn settings(mut self, settings: ConversionSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Default: HTTP downloads.
    pub fn archive_source(mut self, source: Arc<dyn ArchiveSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Default: `paddle2onnx` from `PATH`.
    pub fn converter(mut self, converter: Arc<dyn GraphConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Default: probe `python3` for onnxruntime and fall back to copy-through.
    pub fn optimizer(mut self, optimizer: Arc<dyn GraphOptimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub async fn build(self) -> Result<BatchOrchestrator> {
        let settings = self.settings.unwrap_or_default();
        settings.validate()?;

        let source: Arc<dyn ArchiveSource> = match self.source {
            Some(source) => source,
            None => Arc::new(HttpArchiveSource::new()?),
        };

        let converter = self
            .converter
            .unwrap_or_else(|| Arc::new(Paddle2OnnxConverter::default()));

        let optimizer = match self.optimizer {
            Some(optimizer) => optimizer,
            None => {
                select_optimizer(
                    ExternalTool::new(ToolDefaults::PYTHON),
                    default_scripts_dir(),
                    OptimizerSettings::default(),
                )
                .await
            }
        };

        Ok(BatchOrchestrator {
            catalog: self.catalog.unwrap_or_else(SourceCatalog::pp_ocr_v4),
            settings,
            source,
            converter,
            optimizer,
        })
    }
}

/// Where the optimizer script is deployed unless configured otherwise.
pub fn default_scripts_dir() -> std::path::PathBuf {
    std::env::temp_dir()
        .join(AppConfig::APP_NAME)
        .join(PathsConfig::SCRIPTS_DIR_NAME)
}
