//! The run manifest written at the end of every batch.
//!
//! Serialized to `models_metadata.json` in the output directory. Models
//! appear in request order; failed models are simply absent.

use std::collections::BTreeMap;
use std::path::Path;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::info;

use super::atomic::atomic_write_json;
use crate::catalog::TaskType;
use crate::config::{AppConfig, ConversionSettings};
use crate::conversion::{ConversionResult, ShapeNote};
use crate::Result;

/// Record of everything a conversion run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub version: String,
    pub generated_at: String,
    #[serde(serialize_with = "serialize_models")]
    models: Vec<ConversionResult>,
    pub conversion_settings: ConversionSettings,
    pub optimization_notes: BTreeMap<&'static str, ShapeNote>,
}

impl RunManifest {
    pub fn new(settings: ConversionSettings) -> Self {
        let optimization_notes = TaskType::all()
            .into_iter()
            .map(|task| (task.long_name(), ShapeNote::for_task(task)))
            .collect();

        Self {
            version: AppConfig::MODEL_RELEASE.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            models: Vec::new(),
            conversion_settings: settings,
            optimization_notes,
        }
    }

    /// Add a model entry. A later entry for the same model replaces the
    /// earlier one in place.
    pub fn record(&mut self, result: ConversionResult) {
        match self
            .models
            .iter_mut()
            .find(|existing| existing.model_name == result.model_name)
        {
            Some(existing) => *existing = result,
            None => self.models.push(result),
        }
    }

    pub fn models(&self) -> &[ConversionResult] {
        &self.models
    }

    pub fn get(&self, model_name: &str) -> Option<&ConversionResult> {
        self.models.iter().find(|m| m.model_name == model_name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Serialize entries as a JSON object keyed by model name, keeping order.
fn serialize_models<S: Serializer>(
    models: &[ConversionResult],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(models.len()))?;
    for model in models {
        map.serialize_entry(&model.model_name, model)?;
    }
    map.end()
}

/// Persist the manifest atomically at `path`.
pub fn write_manifest(manifest: &RunManifest, path: &Path) -> Result<()> {
    atomic_write_json(path, manifest)?;
    info!("Model metadata saved to {}", path.display());
    Ok(())
}
