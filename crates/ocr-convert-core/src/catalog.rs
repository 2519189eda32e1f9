//! Model identifiers and the source catalog.
//!
//! A batch request names models with `<type>_<variant>` tokens such as
//! `det_mobile` or `rec_mobile_en`. Tokens are parsed into a [`ModelSpec`]
//! and resolved against a [`SourceCatalog`] before any I/O happens.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::{ConvertError, Result};

/// OCR task a checkpoint was trained for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskType {
    #[serde(rename = "det")]
    Detection,
    #[serde(rename = "rec")]
    Recognition,
}

impl TaskType {
    /// Short token used in model tokens and names.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Detection => "det",
            TaskType::Recognition => "rec",
        }
    }

    pub fn long_name(&self) -> &'static str {
        match self {
            TaskType::Detection => "detection",
            TaskType::Recognition => "recognition",
        }
    }

    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "det" => Some(TaskType::Detection),
            "rec" => Some(TaskType::Recognition),
            _ => None,
        }
    }

    pub fn all() -> [TaskType; 2] {
        [TaskType::Detection, TaskType::Recognition]
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single requested conversion unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelSpec {
    task_type: TaskType,
    variant: String,
}

impl ModelSpec {
    pub fn new(task_type: TaskType, variant: impl Into<String>) -> Self {
        Self {
            task_type,
            variant: variant.into(),
        }
    }

    /// Parse a `<type>_<variant>` token.
    ///
    /// Splits on the first underscore, so `rec_mobile_en` yields the
    /// variant `mobile_en`.
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        let (task, variant) = token
            .split_once('_')
            .filter(|(task, variant)| !task.is_empty() && !variant.is_empty())
            .ok_or_else(|| ConvertError::InvalidToken {
                token: token.to_string(),
            })?;

        let task_type = TaskType::from_token(task).ok_or_else(|| ConvertError::UnknownTaskType {
            token: token.to_string(),
            task: task.to_string(),
        })?;

        Ok(Self::new(task_type, variant))
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Name used for the produced files and the manifest key.
    pub fn model_name(&self) -> String {
        format!(
            "{}_{}_{}",
            AppConfig::MODEL_RELEASE,
            self.variant,
            self.task_type.as_str()
        )
    }

    /// The token this spec was parsed from.
    pub fn token(&self) -> String {
        format!("{}_{}", self.task_type.as_str(), self.variant)
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.task_type.as_str(), self.variant)
    }
}

/// Mapping from `(task type, variant)` to a checkpoint archive URL.
///
/// The catalog is the single source of truth for which variants exist.
/// It is built explicitly and handed to the orchestrator, so tests can
/// substitute their own entries.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    entries: BTreeMap<(TaskType, String), String>,
}

impl SourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The published PP-OCRv4 inference checkpoints.
    pub fn pp_ocr_v4() -> Self {
        const BASE: &str = "https://paddleocr.bj.bcebos.com/PP-OCRv4";

        Self::new()
            .with_entry(
                TaskType::Detection,
                "mobile",
                format!("{BASE}/chinese/ch_PP-OCRv4_det_infer.tar"),
            )
            .with_entry(
                TaskType::Detection,
                "server",
                format!("{BASE}/chinese/ch_PP-OCRv4_det_server_infer.tar"),
            )
            .with_entry(
                TaskType::Recognition,
                "mobile_en",
                format!("{BASE}/english/en_PP-OCRv4_rec_infer.tar"),
            )
            .with_entry(
                TaskType::Recognition,
                "mobile_ch",
                format!("{BASE}/chinese/ch_PP-OCRv4_rec_infer.tar"),
            )
            .with_entry(
                TaskType::Recognition,
                "server_en",
                format!("{BASE}/english/en_PP-OCRv4_rec_server_infer.tar"),
            )
    }

    pub fn with_entry(
        mut self,
        task_type: TaskType,
        variant: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        self.entries.insert((task_type, variant.into()), url.into());
        self
    }

    /// Look up the archive URL for a spec.
    pub fn resolve(&self, spec: &ModelSpec) -> Result<&str> {
        self.entries
            .get(&(spec.task_type(), spec.variant().to_string()))
            .map(String::as_str)
            .ok_or_else(|| ConvertError::CatalogMiss {
                token: spec.token(),
            })
    }

    /// All known specs with their URLs, ordered by task type then variant.
    pub fn entries(&self) -> impl Iterator<Item = (ModelSpec, &str)> {
        self.entries
            .iter()
            .map(|((task, variant), url)| (ModelSpec::new(*task, variant.clone()), url.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detection_token() {
        let spec = ModelSpec::parse("det_mobile").unwrap();
        assert_eq!(spec.task_type(), TaskType::Detection);
        assert_eq!(spec.variant(), "mobile");
        assert_eq!(spec.model_name(), "PP-OCRv5_mobile_det");
    }

    #[test]
    fn test_parse_splits_on_first_underscore() {
        let spec = ModelSpec::parse("rec_mobile_en").unwrap();
        assert_eq!(spec.task_type(), TaskType::Recognition);
        assert_eq!(spec.variant(), "mobile_en");
        assert_eq!(spec.model_name(), "PP-OCRv5_mobile_en_rec");
        assert_eq!(spec.token(), "rec_mobile_en");
    }

    #[test]
    fn test_parse_rejects_malformed_tokens() {
        for token in ["det", "det_", "_mobile", ""] {
            assert!(
                matches!(ModelSpec::parse(token), Err(ConvertError::InvalidToken { .. })),
                "token {token:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_parse_rejects_unknown_task_type() {
        match ModelSpec::parse("cls_mobile") {
            Err(ConvertError::UnknownTaskType { task, .. }) => assert_eq!(task, "cls"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_builtin_catalog_resolves_documented_variants() {
        let catalog = SourceCatalog::pp_ocr_v4();
        for token in [
            "det_mobile",
            "det_server",
            "rec_mobile_en",
            "rec_mobile_ch",
            "rec_server_en",
        ] {
            let spec = ModelSpec::parse(token).unwrap();
            let url = catalog.resolve(&spec).unwrap();
            assert!(url.ends_with("_infer.tar"), "{token} -> {url}");
        }
        assert_eq!(catalog.len(), 5);
    }

    #[test]
    fn test_catalog_miss() {
        let catalog = SourceCatalog::pp_ocr_v4();
        let spec = ModelSpec::parse("det_bogus").unwrap();
        match catalog.resolve(&spec) {
            Err(ConvertError::CatalogMiss { token }) => assert_eq!(token, "det_bogus"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_variant_is_scoped_to_task_type() {
        let catalog = SourceCatalog::pp_ocr_v4();
        let spec = ModelSpec::new(TaskType::Recognition, "mobile");
        assert!(catalog.resolve(&spec).is_err());
    }

    #[test]
    fn test_custom_catalog() {
        let catalog =
            SourceCatalog::new().with_entry(TaskType::Detection, "tiny", "file:///tmp/tiny.tar");
        let spec = ModelSpec::parse("det_tiny").unwrap();
        assert_eq!(catalog.resolve(&spec).unwrap(), "file:///tmp/tiny.tar");
        assert!(!catalog.is_empty());
    }

    #[test]
    fn test_task_type_serializes_short_token() {
        let json = serde_json::to_string(&TaskType::Recognition).unwrap();
        assert_eq!(json, "\"rec\"");
    }
}
