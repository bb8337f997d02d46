//! Error handling for voladjust
//!
//! Errors are split into run-level failures, which abort before or during
//! setup, and per-file failures, which are folded into the batch result.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for voladjust operations
pub type Result<T> = std::result::Result<T, VolumeError>;

/// Main error type for voladjust operations
#[derive(Error, Debug)]
pub enum VolumeError {
    // Run-level errors
    #[error("Required program not available: {program}")]
    DependencyMissing {
        program: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Cache directory unavailable: {path}: {source}")]
    CacheDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Per-file errors
    #[error("Unsupported file: {path} ({reason})")]
    UnsupportedFile { path: PathBuf, reason: String },

    #[error("Could not classify {path}: {reason}")]
    ClassificationError { path: PathBuf, reason: String },

    #[error("Loudness analysis failed for {path}: {reason}")]
    AnalysisError { path: PathBuf, reason: String },

    #[error("Loudness normalization failed for {path}: {reason}")]
    NormalizationError { path: PathBuf, reason: String },

    #[error("Gain adjustment failed for {path}: {reason}")]
    GainApplicationError { path: PathBuf, reason: String },

    #[error("Could not replace {path} with processed audio: {source}")]
    CommitError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Engine invocation errors
    #[error("Failed to start {program}: {source}")]
    EngineSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {timeout_secs}s and was stopped")]
    EngineTimeout { program: String, timeout_secs: u64 },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VolumeError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            VolumeError::DependencyMissing { .. } => "DEPENDENCY_MISSING",
            VolumeError::InvalidInput { .. } => "INVALID_INPUT",
            VolumeError::CacheDirUnavailable { .. } => "CACHE_DIR_UNAVAILABLE",
            VolumeError::UnsupportedFile { .. } => "UNSUPPORTED_FILE",
            VolumeError::ClassificationError { .. } => "CLASSIFICATION_ERROR",
            VolumeError::AnalysisError { .. } => "ANALYSIS_ERROR",
            VolumeError::NormalizationError { .. } => "NORMALIZATION_ERROR",
            VolumeError::GainApplicationError { .. } => "GAIN_APPLICATION_ERROR",
            VolumeError::CommitError { .. } => "COMMIT_ERROR",
            VolumeError::EngineSpawn { .. } => "ENGINE_SPAWN",
            VolumeError::EngineTimeout { .. } => "ENGINE_TIMEOUT",
            VolumeError::Io(_) => "IO_ERROR",
            VolumeError::Json(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error must stop the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VolumeError::DependencyMissing { .. }
                | VolumeError::InvalidInput { .. }
                | VolumeError::CacheDirUnavailable { .. }
        )
    }

    /// Returns a user-friendly recovery suggestion.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            VolumeError::DependencyMissing { .. } => {
                Some("Install ffmpeg (which ships ffprobe) or pass --ffmpeg/--ffprobe.")
            }
            VolumeError::InvalidInput { .. } => {
                Some("Check the path exists and the mode is 1 (basic), 2 (loudness) or 3 (auto).")
            }
            VolumeError::CacheDirUnavailable { .. } => {
                Some("Pass a writable directory with --cache-dir.")
            }
            VolumeError::UnsupportedFile { .. } => {
                Some("Supported extensions: mp3, wav, flac, ogg, aac, m4a, opus.")
            }
            VolumeError::ClassificationError { .. } | VolumeError::AnalysisError { .. } => {
                Some("The file may be corrupted. Check that it plays in another application.")
            }
            VolumeError::EngineTimeout { .. } => Some("Raise --timeout-secs for long files."),
            VolumeError::CommitError { .. } => {
                Some("Check write permission on the file and its directory.")
            }
            _ => None,
        }
    }
}
