//! CLI Command Implementations
//!
//! Wires the configuration, engine, staging area and walker together and
//! prints per-file status lines and the final summary.

use std::path::Path;

use log::{info, warn};

use crate::cli::Cli;
use crate::config::RunConfig;
use crate::engine::{AudioEngine, FfmpegEngine};
use crate::error::{Result, VolumeError};
use crate::processor::FileProcessor;
use crate::report::{BatchResult, ProcessingOutcome, Strategy};
use crate::staging::StagingArea;
use crate::walker::{TreeWalker, WalkEvent};

/// Adjust everything under `cli.path` using the ffmpeg engine.
pub fn adjust(cli: &Cli) -> Result<BatchResult> {
    let config = cli.to_config();
    config.validate()?;

    let engine = FfmpegEngine::new(&config.engine);
    engine.ensure_available()?;

    let batch = run_batch(&engine, &config, &cli.path)?;
    print_summary(&batch);
    Ok(batch)
}

/// Run one batch against `engine`.
///
/// The staging area lives exactly as long as this call and is wiped on the
/// way out whether the batch succeeded or not.
pub fn run_batch(engine: &dyn AudioEngine, config: &RunConfig, root: &Path) -> Result<BatchResult> {
    if !root.exists() {
        return Err(VolumeError::InvalidInput {
            reason: format!("{} does not exist", root.display()),
        });
    }

    info!(
        "Adjusting {} in {} mode with {}",
        root.display(),
        config.mode,
        engine.name()
    );

    let staging = StagingArea::create(&config.cache_dir)?;
    let result = {
        let processor = FileProcessor::new(engine, config, &staging);
        let walker = TreeWalker::new(processor, config, &staging);
        walker.run_with(root, print_event)
    };

    if let Err(e) = staging.wipe() {
        warn!("Could not remove staging directory: {}", e);
    }

    result
}

fn print_event(event: WalkEvent<'_>) {
    match event {
        WalkEvent::Started(path) => println!("Processing {}", path.display()),
        WalkEvent::Finished(outcome) => println!("{}", status_line(outcome)),
    }
}

/// One-line result for a processed file.
pub fn status_line(outcome: &ProcessingOutcome) -> String {
    if outcome.success {
        let detail = match (outcome.strategy, outcome.applied_gain_db, outcome.measured_loudness_lufs) {
            (Some(Strategy::BasicGain), Some(gain), _) => format!("basic gain {:+.2} dB", gain),
            (Some(Strategy::LoudnessNormalization), _, Some(lufs)) => {
                format!("loudness normalized from {:.1} LUFS", lufs)
            }
            (Some(strategy), _, _) => strategy.to_string(),
            (None, _, _) => "done".to_string(),
        };
        format!("  Success: {} ({})", outcome.path.display(), detail)
    } else {
        format!(
            "  Failure: {}: {}",
            outcome.path.display(),
            outcome.error_detail.as_deref().unwrap_or("unknown error")
        )
    }
}

pub fn print_summary(batch: &BatchResult) {
    println!();
    if batch.attempted() == 0 {
        println!("No eligible audio files found in {}", batch.root.display());
    } else if batch.is_success() {
        println!(
            "All files processed successfully ({} file(s))",
            batch.attempted()
        );
    } else {
        println!(
            "Some files could not be processed ({} of {} failed):",
            batch.failure_count(),
            batch.attempted()
        );
        for outcome in batch.failures() {
            println!("  {}", outcome.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_line_success() {
        let mut outcome = ProcessingOutcome::new(Path::new("/music/a.flac"));
        outcome.strategy = Some(Strategy::BasicGain);
        outcome.applied_gain_db = Some(2.5);
        let line = status_line(&outcome.commit());
        assert_eq!(line, "  Success: /music/a.flac (basic gain +2.50 dB)");
    }

    #[test]
    fn test_status_line_failure() {
        let err = VolumeError::NormalizationError {
            path: PathBuf::from("/music/b.mp3"),
            reason: "exit status 1".to_string(),
        };
        let outcome = ProcessingOutcome::new(Path::new("/music/b.mp3")).fail(&err);
        let line = status_line(&outcome);
        assert!(line.starts_with("  Failure: /music/b.mp3:"));
        assert!(line.contains("exit status 1"));
    }

    #[test]
    fn test_missing_root_is_invalid_input() {
        let engine = FfmpegEngine::default();
        let err = run_batch(
            &engine,
            &RunConfig::default(),
            Path::new("/nonexistent/voladjust/music"),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }
}
