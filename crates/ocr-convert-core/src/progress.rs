//! Per-model stage tracking and the batch report.

use std::path::PathBuf;

use tracing::{debug, error, warn};

use crate::conversion::ModelStage;
use crate::ConvertError;

/// Final state of one requested token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOutcome {
    pub token: String,
    /// Set once the token parsed into a model spec.
    pub model_name: Option<String>,
    /// `Recorded` or `Failed`.
    pub stage: ModelStage,
    /// Stage that was running when processing failed.
    pub failed_at: Option<ModelStage>,
    pub error: Option<String>,
    /// The token was rejected before any I/O (bad token or catalog miss).
    pub skipped: bool,
}

impl ModelOutcome {
    pub fn is_recorded(&self) -> bool {
        self.stage == ModelStage::Recorded
    }
}

/// Walks one model through `Pending → Fetching → Converting → Optimizing →
/// Recorded`, or to `Failed` from whichever stage was active.
#[derive(Debug)]
pub struct ModelTracker {
    token: String,
    model_name: Option<String>,
    stage: ModelStage,
}

impl ModelTracker {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            model_name: None,
            stage: ModelStage::Pending,
        }
    }

    pub fn set_model_name(&mut self, name: impl Into<String>) {
        self.model_name = Some(name.into());
    }

    pub fn stage(&self) -> ModelStage {
        self.stage
    }

    pub fn advance(&mut self, stage: ModelStage) {
        debug!("[{}] {} -> {}", self.token, self.stage, stage);
        self.stage = stage;
    }

    /// Finish successfully.
    pub fn recorded(mut self) -> ModelOutcome {
        self.advance(ModelStage::Recorded);
        ModelOutcome {
            token: self.token,
            model_name: self.model_name,
            stage: ModelStage::Recorded,
            failed_at: None,
            error: None,
            skipped: false,
        }
    }

    /// Finish with an error from the current stage.
    ///
    /// Request errors are skips and log at `warn`; anything later is a
    /// failure and logs at `error`.
    pub fn failed(self, err: &ConvertError) -> ModelOutcome {
        let skipped = err.is_request_error();
        if skipped {
            warn!("Skipping {}: {}", self.token, err);
        } else {
            error!("Error processing {} while {}: {}", self.token, self.stage, err);
        }

        ModelOutcome {
            token: self.token,
            model_name: self.model_name,
            stage: ModelStage::Failed,
            failed_at: Some(self.stage),
            error: Some(err.to_string()),
            skipped,
        }
    }
}

/// Summary of a finished batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub outcomes: Vec<ModelOutcome>,
}

impl BatchReport {
    pub fn recorded(&self) -> impl Iterator<Item = &ModelOutcome> {
        self.outcomes.iter().filter(|o| o.is_recorded())
    }

    /// Every outcome that was not recorded, skips included.
    pub fn failed(&self) -> impl Iterator<Item = &ModelOutcome> {
        self.outcomes.iter().filter(|o| !o.is_recorded())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ModelOutcome> {
        self.outcomes.iter().filter(|o| o.skipped)
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(ModelOutcome::is_recorded)
    }
}
