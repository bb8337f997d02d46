//! Per-file outcomes and batch results

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::Codec;
use crate::error::{Result, VolumeError};

/// Life cycle of one file through the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    PendingClassification,
    PendingStrategySelection,
    Processing,
    Staged,
    Committed,
    Failed,
}

impl FileState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: FileState) -> bool {
        use FileState::*;
        matches!(
            (self, next),
            (PendingClassification, PendingStrategySelection)
                | (PendingStrategySelection, Processing)
                | (Processing, Staged)
                | (Staged, Committed)
                | (PendingClassification, Failed)
                | (PendingStrategySelection, Failed)
                | (Processing, Failed)
                | (Staged, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FileState::Committed | FileState::Failed)
    }
}

/// Which adjustment was applied to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Peak measurement followed by a uniform gain
    BasicGain,
    /// Loudness measurement followed by a linear correction pass
    LoudnessNormalization,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::BasicGain => write!(f, "basic gain"),
            Strategy::LoudnessNormalization => write!(f, "loudness normalization"),
        }
    }
}

/// Result of processing one file.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub path: PathBuf,
    pub success: bool,
    pub state: FileState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<Codec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    /// Gain applied by the basic path (dB)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_gain_db: Option<f64>,
    /// Integrated loudness measured before correction (LUFS)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measured_loudness_lufs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ProcessingOutcome {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            state: FileState::PendingClassification,
            codec: None,
            strategy: None,
            applied_gain_db: None,
            measured_loudness_lufs: None,
            error_code: None,
            error_detail: None,
        }
    }

    /// Record a failure in the current state.
    pub fn fail(mut self, error: &VolumeError) -> Self {
        self.success = false;
        self.state = FileState::Failed;
        self.error_code = Some(error.error_code());
        self.error_detail = Some(error.to_string());
        self
    }

    pub fn commit(mut self) -> Self {
        self.success = true;
        self.state = FileState::Committed;
        self
    }
}

/// Outcomes of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ProcessingOutcome>,
}

impl BatchResult {
    pub fn new(root: &Path) -> Self {
        let now = Utc::now();
        Self {
            root: root.to_path_buf(),
            started_at: now,
            finished_at: now,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: ProcessingOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.attempted() - self.success_count()
    }

    /// True only if every processed file succeeded.
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProcessingOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    /// Write the result as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
