//! Peak-based gain
//!
//! Measures a file's maximum sample level and scales every sample so that
//! the peak lands on the target. The adjustment is one uniform volume
//! filter; frequency content and dynamics are untouched.

use std::path::Path;

use log::debug;

use crate::classify::AudioFile;
use crate::engine::{AudioEngine, AudioFilter, Invocation};
use crate::error::{Result, VolumeError};

/// Marker of the peak line printed by the peak-detection pass.
const MAX_VOLUME_MARKER: &str = "max_volume:";

/// Gain in dB that moves `measured_peak_db` onto `target_peak_db`.
#[inline]
pub fn compute_gain(measured_peak_db: f64, target_peak_db: f64) -> f64 {
    target_peak_db - measured_peak_db
}

/// Prefix a leading zero onto a bare decimal such as `.5` or `-.5`.
pub fn normalize_decimal(text: &str) -> String {
    let text = text.trim();
    let (sign, digits) = match text.strip_prefix(['-', '+']) {
        Some(rest) => (&text[..1], rest),
        None => ("", text),
    };
    if digits.starts_with('.') {
        format!("{}0{}", sign, digits)
    } else {
        text.to_string()
    }
}

/// Parse a level reported by the engine, tolerating bare decimals.
pub fn parse_level(text: &str) -> Option<f64> {
    normalize_decimal(text).parse().ok()
}

/// Find the maximum sample level (dB) in peak-detection diagnostics.
pub fn parse_max_volume(diagnostics: &str) -> Option<f64> {
    diagnostics.lines().find_map(|line| {
        let (_, rest) = line.split_once(MAX_VOLUME_MARKER)?;
        let value = rest.trim().trim_end_matches("dB").trim();
        parse_level(value)
    })
}

/// Run the peak-detection pass over the whole file.
pub fn measure_peak(engine: &dyn AudioEngine, file: &AudioFile) -> Result<f64> {
    let output = engine.execute(&Invocation::DetectPeak {
        input: file.path.clone(),
    })?;

    if !output.success {
        return Err(VolumeError::GainApplicationError {
            path: file.path.clone(),
            reason: format!("peak detection failed ({})", output.failure_summary()),
        });
    }

    let peak = parse_max_volume(&output.stderr)
        .or_else(|| parse_max_volume(&output.stdout))
        .ok_or_else(|| VolumeError::GainApplicationError {
            path: file.path.clone(),
            reason: "peak detection reported no maximum level".to_string(),
        })?;

    if !peak.is_finite() {
        return Err(VolumeError::GainApplicationError {
            path: file.path.clone(),
            reason: format!("peak level is not usable ({})", peak),
        });
    }

    debug!("Peak of {}: {:.2} dB", file.path.display(), peak);
    Ok(peak)
}

/// Write `file` scaled by `gain_db` to `staged`.
pub fn apply_gain(
    engine: &dyn AudioEngine,
    file: &AudioFile,
    staged: &Path,
    gain_db: f64,
) -> Result<()> {
    let output = engine.execute(&Invocation::ApplyFilter {
        input: file.path.clone(),
        output: staged.to_path_buf(),
        filter: AudioFilter::Volume { gain_db },
        sample_rate: None,
        bit_rate: file.encode_bit_rate(),
    })?;

    if !output.success {
        return Err(VolumeError::GainApplicationError {
            path: file.path.clone(),
            reason: output.failure_summary(),
        });
    }

    Ok(())
}
