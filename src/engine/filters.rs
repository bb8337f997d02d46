//! Filter definitions passed to the engine.

use std::fmt;

use crate::analyzer::LoudnessStats;
use crate::config::{MeasurementProfile, Targets};

/// How the loudness filter reports what it measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintFormat {
    Json,
    Summary,
}

impl fmt::Display for PrintFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrintFormat::Json => write!(f, "json"),
            PrintFormat::Summary => write!(f, "summary"),
        }
    }
}

/// EBU R128 loudness filter parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnormFilter {
    pub integrated: f64,
    pub true_peak: f64,
    pub loudness_range: f64,
    /// Statistics of a previous measurement pass
    pub measured: Option<LoudnessStats>,
    /// Apply one linear gain instead of dynamic compression
    pub linear: bool,
    pub print_format: PrintFormat,
}

impl LoudnormFilter {
    /// First pass: measure against the reference profile.
    pub fn measurement(profile: &MeasurementProfile) -> Self {
        Self {
            integrated: profile.integrated_lufs,
            true_peak: profile.true_peak_db,
            loudness_range: profile.loudness_range,
            measured: None,
            linear: false,
            print_format: PrintFormat::Json,
        }
    }

    /// Second pass: correct towards `targets` using measured statistics.
    pub fn correction(targets: &Targets, stats: &LoudnessStats) -> Self {
        Self {
            integrated: targets.target_loudness_lufs,
            true_peak: targets.true_peak_ceiling_db,
            loudness_range: targets.loudness_range_target,
            measured: Some(*stats),
            linear: true,
            print_format: PrintFormat::Summary,
        }
    }
}

impl fmt::Display for LoudnormFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loudnorm=I={}:TP={}:LRA={}",
            self.integrated, self.true_peak, self.loudness_range
        )?;
        if let Some(stats) = &self.measured {
            write!(
                f,
                ":measured_I={}:measured_TP={}:measured_LRA={}:measured_thresh={}:offset={}",
                stats.input_i,
                stats.input_tp,
                stats.input_lra,
                stats.input_thresh,
                stats.target_offset
            )?;
        }
        if self.linear {
            write!(f, ":linear=true")?;
        }
        write!(f, ":print_format={}", self.print_format)
    }
}

/// A filter that produces new audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioFilter {
    /// Uniform linear scale of every sample
    Volume { gain_db: f64 },
    Loudnorm(LoudnormFilter),
}

impl fmt::Display for AudioFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioFilter::Volume { gain_db } => write!(f, "volume={}dB", gain_db),
            AudioFilter::Loudnorm(filter) => filter.fmt(f),
        }
    }
}
