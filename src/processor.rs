//! File processor
//!
//! Drives one file through classification, strategy selection, processing
//! into the staging area and the final commit. Every error is caught here
//! and turned into a failed [`ProcessingOutcome`]; nothing escapes to abort
//! the batch.

use std::path::Path;

use log::{debug, info, warn};

use crate::analyzer;
use crate::classify::{self, AudioFile, Codec};
use crate::config::{Mode, RunConfig};
use crate::engine::AudioEngine;
use crate::error::Result;
use crate::gain;
use crate::normalizer;
use crate::report::{FileState, ProcessingOutcome, Strategy};
use crate::staging::StagingArea;

/// Pick the adjustment for a file of class `codec` under `mode`.
pub fn select_strategy(mode: Mode, codec: Codec) -> Strategy {
    match (mode, codec) {
        (Mode::Basic, _) => Strategy::BasicGain,
        (Mode::Loudness, _) => Strategy::LoudnessNormalization,
        (Mode::Auto, Codec::Lossy) => Strategy::LoudnessNormalization,
        (Mode::Auto, Codec::Lossless) => Strategy::BasicGain,
    }
}

pub struct FileProcessor<'a> {
    engine: &'a dyn AudioEngine,
    config: &'a RunConfig,
    staging: &'a StagingArea,
}

impl<'a> FileProcessor<'a> {
    pub fn new(engine: &'a dyn AudioEngine, config: &'a RunConfig, staging: &'a StagingArea) -> Self {
        Self {
            engine,
            config,
            staging,
        }
    }

    /// Process one file and report how far it got.
    pub fn process(&self, path: &Path) -> ProcessingOutcome {
        let mut outcome = ProcessingOutcome::new(path);
        match self.run(path, &mut outcome) {
            Ok(()) => {
                info!("Adjusted {}", path.display());
                outcome.commit()
            }
            Err(e) => {
                warn!("{} failed in state {:?}: {}", path.display(), outcome.state, e);
                outcome.fail(&e)
            }
        }
    }

    fn run(&self, path: &Path, outcome: &mut ProcessingOutcome) -> Result<()> {
        let file = classify::classify(self.engine, path, &self.config.extensions)?;
        outcome.codec = Some(file.codec);
        advance(outcome, FileState::PendingStrategySelection);

        let strategy = select_strategy(self.config.mode, file.codec);
        outcome.strategy = Some(strategy);
        debug!("{}: {} ({})", path.display(), strategy, file.codec);
        advance(outcome, FileState::Processing);

        let staged = self.staging.staged_path(&file);
        self.staging.discard(&staged);
        if let Err(e) = self.stage(&file, strategy, &staged, outcome) {
            self.staging.discard(&staged);
            return Err(e);
        }
        advance(outcome, FileState::Staged);

        if let Err(e) = self.staging.commit(&staged, &file.path) {
            self.staging.discard(&staged);
            return Err(e);
        }
        advance(outcome, FileState::Committed);
        Ok(())
    }

    fn stage(
        &self,
        file: &AudioFile,
        strategy: Strategy,
        staged: &Path,
        outcome: &mut ProcessingOutcome,
    ) -> Result<()> {
        match strategy {
            Strategy::BasicGain => {
                let peak = gain::measure_peak(self.engine, file)?;
                let gain_db = gain::compute_gain(peak, self.config.targets.target_peak_db);
                outcome.applied_gain_db = Some(gain_db);
                debug!(
                    "{}: peak {:.2} dB, applying {:+.2} dB",
                    file.path.display(),
                    peak,
                    gain_db
                );
                gain::apply_gain(self.engine, file, staged, gain_db)
            }
            Strategy::LoudnessNormalization => {
                let stats = analyzer::analyze(self.engine, file, &self.config.measurement)?;
                outcome.measured_loudness_lufs = Some(stats.input_i);
                normalizer::normalize(self.engine, file, &stats, &self.config.targets, staged)
                    .map(|_| ())
            }
        }
    }
}

fn advance(outcome: &mut ProcessingOutcome, next: FileState) {
    debug_assert!(
        outcome.state.can_transition_to(next),
        "illegal transition {:?} -> {:?}",
        outcome.state,
        next
    );
    outcome.state = next;
}
