//! Run configuration
//!
//! Built once at startup and passed by reference to every component.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolumeError};

/// Extensions accepted by the file classifier unless overridden.
pub const DEFAULT_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "aac", "m4a", "opus"];

/// How each eligible file is adjusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Peak-based gain for every file
    #[default]
    Basic,
    /// Two-pass loudness normalization for every file
    Loudness,
    /// Lossy codecs get loudness normalization, lossless codecs get peak gain
    Auto,
}

impl Mode {
    /// Numeric selector used on the command line.
    pub fn selector(&self) -> u8 {
        match self {
            Mode::Basic => 1,
            Mode::Loudness => 2,
            Mode::Auto => 3,
        }
    }
}

impl TryFrom<u8> for Mode {
    type Error = VolumeError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Mode::Basic),
            2 => Ok(Mode::Loudness),
            3 => Ok(Mode::Auto),
            other => Err(VolumeError::InvalidInput {
                reason: format!("mode must be 1, 2 or 3, got {}", other),
            }),
        }
    }
}

impl FromStr for Mode {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "basic" => Ok(Mode::Basic),
            "2" | "loudness" => Ok(Mode::Loudness),
            "3" | "auto" => Ok(Mode::Auto),
            other => Err(VolumeError::InvalidInput {
                reason: format!("mode must be 1, 2 or 3, got '{}'", other),
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Basic => write!(f, "basic"),
            Mode::Loudness => write!(f, "loudness"),
            Mode::Auto => write!(f, "auto"),
        }
    }
}

/// Final correction targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    /// Peak level the basic gain path aims for (dBFS)
    pub target_peak_db: f64,
    /// Integrated loudness of the correction pass (LUFS)
    pub target_loudness_lufs: f64,
    /// True-peak ceiling of the correction pass (dBTP)
    pub true_peak_ceiling_db: f64,
    /// Loudness range target of the correction pass (LU)
    pub loudness_range_target: f64,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            target_peak_db: 0.0,
            target_loudness_lufs: -12.0,
            true_peak_ceiling_db: -1.5,
            loudness_range_target: 20.0,
        }
    }
}

/// Reference profile for the measurement pass.
///
/// Kept apart from [`Targets`]: statistics are always taken against the same
/// reference, whatever the final correction targets are.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementProfile {
    pub integrated_lufs: f64,
    pub true_peak_db: f64,
    pub loudness_range: f64,
}

impl Default for MeasurementProfile {
    fn default() -> Self {
        Self {
            integrated_lufs: -16.0,
            true_peak_db: -1.5,
            loudness_range: 11.0,
        }
    }
}

/// Location of the engine programs and invocation limits.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// Per-invocation limit; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            timeout: None,
        }
    }
}

/// Immutable configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: Mode,
    pub targets: Targets,
    pub measurement: MeasurementProfile,
    pub engine: EngineConfig,
    /// Parent directory of the process-scoped staging directory
    pub cache_dir: PathBuf,
    pub follow_symlinks: bool,
    /// Lowercase extensions without the leading dot
    pub extensions: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            targets: Targets::default(),
            measurement: MeasurementProfile::default(),
            engine: EngineConfig::default(),
            cache_dir: std::env::temp_dir(),
            follow_symlinks: false,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl RunConfig {
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Reject values the engine cannot be parametrized with.
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("target peak", self.targets.target_peak_db),
            ("target loudness", self.targets.target_loudness_lufs),
            ("true peak ceiling", self.targets.true_peak_ceiling_db),
            ("loudness range", self.targets.loudness_range_target),
            ("measurement loudness", self.measurement.integrated_lufs),
            ("measurement true peak", self.measurement.true_peak_db),
            ("measurement loudness range", self.measurement.loudness_range),
        ];
        for (name, value) in values {
            if !value.is_finite() {
                return Err(VolumeError::InvalidInput {
                    reason: format!("{} must be a finite number, got {}", name, value),
                });
            }
        }

        if self.extensions.is_empty() {
            return Err(VolumeError::InvalidInput {
                reason: "at least one file extension must be accepted".to_string(),
            });
        }

        if self.targets.target_peak_db > 0.0 {
            log::warn!(
                "Target peak {:.1} dBFS is above full scale and will clip",
                self.targets.target_peak_db
            );
        }

        Ok(())
    }

    /// Whether `extension` (any case, no dot) is accepted.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.extensions.iter().any(|e| *e == extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1", Mode::Basic)]
    #[test_case("2", Mode::Loudness)]
    #[test_case("3", Mode::Auto)]
    #[test_case("auto", Mode::Auto)]
    #[test_case(" Loudness ", Mode::Loudness)]
    fn test_mode_parse(input: &str, expected: Mode) {
        assert_eq!(input.parse::<Mode>().unwrap(), expected);
    }

    #[test]
    fn test_mode_rejects_unknown() {
        let err = "4".parse::<Mode>().unwrap_err();
        assert!(err.is_fatal());
        assert!(Mode::try_from(0).is_err());
    }

    #[test]
    fn test_default_mode_is_basic() {
        assert_eq!(Mode::default(), Mode::Basic);
        assert_eq!(RunConfig::default().mode, Mode::Basic);
        assert_eq!(Mode::Auto.selector(), 3);
    }

    #[test]
    fn test_defaults() {
        let targets = Targets::default();
        assert_eq!(targets.target_loudness_lufs, -12.0);
        assert_eq!(targets.true_peak_ceiling_db, -1.5);
        assert_eq!(targets.loudness_range_target, 20.0);

        let profile = MeasurementProfile::default();
        assert_eq!(profile.integrated_lufs, -16.0);
        assert_eq!(profile.loudness_range, 11.0);
    }

    #[test]
    fn test_extensions_normalized() {
        let config = RunConfig::default().with_extensions([".MP3", "Flac", " "]);
        assert_eq!(config.extensions, vec!["mp3".to_string(), "flac".to_string()]);
        assert!(config.accepts_extension("FLAC"));
        assert!(!config.accepts_extension("wav"));
    }

    #[test]
    fn test_validate_rejects_non_finite_target() {
        let mut config = RunConfig::default();
        config.targets.target_loudness_lufs = f64::NAN;
        assert!(config.validate().is_err());

        let config = RunConfig::default().with_extensions(Vec::<String>::new());
        assert!(config.validate().is_err());

        assert!(RunConfig::default().validate().is_ok());
    }
}
