//! Loudness correction pass
//!
//! Feeds the measured statistics back into the loudness filter with linear
//! mode on, so the correction is a single gain derived from the measurement
//! instead of another round of adaptive range compression.

use std::path::{Path, PathBuf};

use log::debug;

use crate::analyzer::LoudnessStats;
use crate::classify::AudioFile;
use crate::config::Targets;
use crate::engine::{AudioEngine, AudioFilter, Invocation, LoudnormFilter};
use crate::error::{Result, VolumeError};

/// Write a loudness-corrected copy of `file` to `staged`.
///
/// On failure any partial output at `staged` is removed.
pub fn normalize(
    engine: &dyn AudioEngine,
    file: &AudioFile,
    stats: &LoudnessStats,
    targets: &Targets,
    staged: &Path,
) -> Result<PathBuf> {
    let filter = LoudnormFilter::correction(targets, stats);
    debug!("Correcting {} with {}", file.path.display(), filter);

    let outcome = engine.execute(&Invocation::ApplyFilter {
        input: file.path.clone(),
        output: staged.to_path_buf(),
        filter: AudioFilter::Loudnorm(filter),
        sample_rate: file.sample_rate,
        bit_rate: file.encode_bit_rate(),
    });

    let failure = match outcome {
        Ok(output) if output.success => return Ok(staged.to_path_buf()),
        Ok(output) => VolumeError::NormalizationError {
            path: file.path.clone(),
            reason: output.failure_summary(),
        },
        Err(e) => e,
    };

    if staged.exists() {
        let _ = std::fs::remove_file(staged);
    }
    Err(failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Codec;
    use crate::engine::EngineOutput;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::tempdir;

    struct Recorder {
        calls: RefCell<Vec<Invocation>>,
        succeed: bool,
    }

    impl AudioEngine for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn ensure_available(&self) -> Result<()> {
            Ok(())
        }

        fn execute(&self, invocation: &Invocation) -> Result<EngineOutput> {
            self.calls.borrow_mut().push(invocation.clone());
            if let Some(output) = invocation.output() {
                fs::write(output, b"partial").unwrap();
            }
            if self.succeed {
                Ok(EngineOutput::success("", ""))
            } else {
                Ok(EngineOutput::failure(1, "Error while filtering"))
            }
        }
    }

    fn stats() -> LoudnessStats {
        LoudnessStats {
            input_i: -9.84,
            input_tp: 0.41,
            input_lra: 5.6,
            input_thresh: -20.06,
            target_offset: 0.29,
        }
    }

    fn file(path: PathBuf) -> AudioFile {
        AudioFile {
            path,
            extension: "mp3".to_string(),
            codec: Codec::Lossy,
            codec_name: "mp3".to_string(),
            sample_rate: Some(44100),
            bit_rate: Some(320_000),
        }
    }

    #[test]
    fn test_normalize_issues_linear_correction() {
        let dir = tempdir().unwrap();
        let staged = dir.path().join("song.mp3");
        let engine = Recorder {
            calls: RefCell::new(Vec::new()),
            succeed: true,
        };

        let out = normalize(
            &engine,
            &file(PathBuf::from("/music/song.mp3")),
            &stats(),
            &Targets::default(),
            &staged,
        )
        .unwrap();
        assert_eq!(out, staged);

        let calls = engine.calls.borrow();
        match &calls[0] {
            Invocation::ApplyFilter {
                filter: AudioFilter::Loudnorm(filter),
                sample_rate,
                bit_rate,
                ..
            } => {
                assert!(filter.linear);
                assert_eq!(filter.integrated, -12.0);
                assert_eq!(filter.loudness_range, 20.0);
                assert_eq!(filter.measured, Some(stats()));
                assert_eq!(*sample_rate, Some(44100));
                assert_eq!(*bit_rate, Some(320_000));
            }
            other => panic!("unexpected invocation {:?}", other),
        }
    }

    #[test]
    fn test_failed_correction_leaves_no_staged_file() {
        let dir = tempdir().unwrap();
        let staged = dir.path().join("song.mp3");
        let engine = Recorder {
            calls: RefCell::new(Vec::new()),
            succeed: false,
        };

        let err = normalize(
            &engine,
            &file(PathBuf::from("/music/song.mp3")),
            &stats(),
            &Targets::default(),
            &staged,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "NORMALIZATION_ERROR");
        assert!(!staged.exists());
    }
}
