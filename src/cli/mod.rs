//! CLI Module
//!
//! Command-line interface for voladjust.

pub mod commands;

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{EngineConfig, MeasurementProfile, Mode, RunConfig, Targets};

/// Adjust the volume of audio files by peak gain or loudness normalization
#[derive(Parser, Debug)]
#[command(name = "voladjust")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Audio file or directory (processed recursively)
    pub path: PathBuf,

    /// 1 = basic peak gain, 2 = loudness normalization, 3 = auto (by codec)
    #[arg(default_value = "1")]
    pub mode: Mode,

    /// Enable verbose output
    #[arg(short, long, env = "VOLADJUST_VERBOSE")]
    pub verbose: bool,

    /// Peak level for basic gain (dBFS)
    #[arg(long, env = "VOLADJUST_TARGET_PEAK", default_value_t = 0.0, allow_negative_numbers = true)]
    pub target_peak: f64,

    /// Integrated loudness for normalization (LUFS)
    #[arg(long, env = "VOLADJUST_TARGET_LOUDNESS", default_value_t = -12.0, allow_negative_numbers = true)]
    pub target_loudness: f64,

    /// True-peak ceiling for normalization (dBTP)
    #[arg(long, env = "VOLADJUST_TRUE_PEAK", default_value_t = -1.5, allow_negative_numbers = true)]
    pub true_peak: f64,

    /// Loudness range target for normalization (LU)
    #[arg(long, env = "VOLADJUST_LOUDNESS_RANGE", default_value_t = 20.0)]
    pub loudness_range: f64,

    /// Reference integrated loudness of the measurement pass (LUFS)
    #[arg(long, env = "VOLADJUST_MEASURE_LOUDNESS", default_value_t = -16.0, allow_negative_numbers = true)]
    pub measure_loudness: f64,

    /// Reference true peak of the measurement pass (dBTP)
    #[arg(long, env = "VOLADJUST_MEASURE_TRUE_PEAK", default_value_t = -1.5, allow_negative_numbers = true)]
    pub measure_true_peak: f64,

    /// Reference loudness range of the measurement pass (LU)
    #[arg(long, env = "VOLADJUST_MEASURE_LOUDNESS_RANGE", default_value_t = 11.0)]
    pub measure_loudness_range: f64,

    /// ffmpeg executable
    #[arg(long, env = "VOLADJUST_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// ffprobe executable
    #[arg(long, env = "VOLADJUST_FFPROBE", default_value = "ffprobe")]
    pub ffprobe: PathBuf,

    /// Directory holding the staging area (defaults to the system temp dir)
    #[arg(long, env = "VOLADJUST_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Stop any single engine run after this many seconds
    #[arg(long, env = "VOLADJUST_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Follow symbolic links while walking directories
    #[arg(long, env = "VOLADJUST_FOLLOW_SYMLINKS")]
    pub follow_symlinks: bool,

    /// Comma-separated list of extensions to process
    #[arg(long, value_delimiter = ',', env = "VOLADJUST_EXTENSIONS")]
    pub extensions: Option<Vec<String>>,

    /// Write a JSON report of the run to this file
    #[arg(long, env = "VOLADJUST_REPORT")]
    pub report: Option<PathBuf>,
}

impl Cli {
    /// Build the run configuration from parsed arguments.
    pub fn to_config(&self) -> RunConfig {
        let mut config = RunConfig {
            mode: self.mode,
            targets: Targets {
                target_peak_db: self.target_peak,
                target_loudness_lufs: self.target_loudness,
                true_peak_ceiling_db: self.true_peak,
                loudness_range_target: self.loudness_range,
            },
            measurement: MeasurementProfile {
                integrated_lufs: self.measure_loudness,
                true_peak_db: self.measure_true_peak,
                loudness_range: self.measure_loudness_range,
            },
            engine: EngineConfig {
                ffmpeg: self.ffmpeg.clone(),
                ffprobe: self.ffprobe.clone(),
                timeout: self.timeout_secs.map(Duration::from_secs),
            },
            follow_symlinks: self.follow_symlinks,
            ..RunConfig::default()
        };

        if let Some(cache_dir) = &self.cache_dir {
            config = config.with_cache_dir(cache_dir);
        }
        if let Some(extensions) = &self.extensions {
            config = config.with_extensions(extensions);
        }
        config
    }
}
