//! Shared test helpers
//!
//! `ScriptedEngine` stands in for ffmpeg: it answers each invocation with
//! canned output, records what it was asked to do and writes a marker file
//! for every output it is asked to produce.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use voladjust::engine::{AudioEngine, EngineOutput, Invocation};
use voladjust::{Result, RunConfig, VolumeError};

pub const LOUDNORM_REPORT: &str = r#"[Parsed_loudnorm_0 @ 0x5566e1c0b880]
{
	"input_i" : "-20.50",
	"input_tp" : "-4.20",
	"input_lra" : "6.10",
	"input_thresh" : "-31.00",
	"output_i" : "-16.02",
	"output_tp" : "-1.50",
	"output_lra" : "5.00",
	"output_thresh" : "-26.50",
	"normalization_type" : "dynamic",
	"target_offset" : "-.02"
}
"#;

/// Which invocations of a file should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    /// Every invocation fails, like a corrupted file
    Everything,
    /// Only the pass that writes output fails
    Output,
    /// The measurement pass prints no statistics block
    MissingStatistics,
    /// The engine has to be stopped
    Timeout,
}

#[derive(Default)]
pub struct ScriptedEngine {
    pub calls: RefCell<Vec<Invocation>>,
    failures: Vec<(String, FailAt)>,
    peak: Option<String>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make invocations for files named `file_name` fail.
    pub fn failing(mut self, file_name: &str, at: FailAt) -> Self {
        self.failures.push((file_name.to_string(), at));
        self
    }

    /// Text printed as the measured maximum level.
    pub fn with_peak(mut self, peak: &str) -> Self {
        self.peak = Some(peak.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Invocations that read `file_name`.
    pub fn calls_for(&self, file_name: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.input().file_name().map_or(false, |n| n == file_name))
            .collect()
    }

    fn failure_for(&self, input: &Path) -> Option<FailAt> {
        let name = input.file_name()?.to_string_lossy();
        self.failures
            .iter()
            .find(|(file, _)| *file == name)
            .map(|(_, at)| *at)
    }
}

fn codec_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or_default() {
        "mp3" => "mp3",
        "ogg" => "vorbis",
        "opus" => "opus",
        "aac" | "m4a" => "aac",
        "wav" => "pcm_s16le",
        _ => "flac",
    }
}

impl AudioEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    fn execute(&self, invocation: &Invocation) -> Result<EngineOutput> {
        self.calls.borrow_mut().push(invocation.clone());
        let failure = self.failure_for(invocation.input());

        match failure {
            Some(FailAt::Everything) => {
                return Ok(EngineOutput::failure(
                    1,
                    "Invalid data found when processing input",
                ))
            }
            Some(FailAt::Timeout) if invocation.output().is_some() => {
                return Err(VolumeError::EngineTimeout {
                    program: "ffmpeg".to_string(),
                    timeout_secs: 1,
                })
            }
            _ => {}
        }

        match invocation {
            Invocation::ProbeStream { input } => Ok(EngineOutput::success(
                format!(
                    r#"{{"programs": [], "streams": [{{"codec_name": "{}", "sample_rate": "44100", "bit_rate": "320000"}}]}}"#,
                    codec_for(input)
                ),
                "",
            )),
            Invocation::DetectPeak { .. } => {
                let peak = self.peak.as_deref().unwrap_or("-3.0");
                Ok(EngineOutput::success(
                    "",
                    format!(
                        "[Parsed_volumedetect_0 @ 0x1] n_samples: 88200\n\
                         [Parsed_volumedetect_0 @ 0x1] mean_volume: -18.2 dB\n\
                         [Parsed_volumedetect_0 @ 0x1] max_volume: {} dB\n",
                        peak
                    ),
                ))
            }
            Invocation::MeasureLoudness { .. } => {
                if failure == Some(FailAt::MissingStatistics) {
                    Ok(EngineOutput::success("", "size=N/A time=00:00:02.00\n"))
                } else {
                    Ok(EngineOutput::success(
                        "",
                        format!("Input #0, mp3, from 'x':\n{}video:0kB audio:0kB\n", LOUDNORM_REPORT),
                    ))
                }
            }
            Invocation::ApplyFilter { output, filter, .. } => {
                // A failing encoder still leaves a partial file behind.
                fs::write(output, format!("processed by {}", filter))?;
                if failure == Some(FailAt::Output) {
                    Ok(EngineOutput::failure(1, "Error while filtering: Invalid argument"))
                } else {
                    Ok(EngineOutput::success("", "size=  1024kB"))
                }
            }
        }
    }
}

/// A music directory plus a separate cache directory.
pub struct Fixture {
    pub root: TempDir,
    pub cache: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
            cache: TempDir::new().unwrap(),
        }
    }

    pub fn music(&self) -> &Path {
        self.root.path()
    }

    /// Create `relative` below the music directory with `contents`.
    pub fn add(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn config(&self) -> RunConfig {
        RunConfig::default().with_cache_dir(self.cache.path())
    }

    /// Entries left in the cache directory.
    pub fn cache_entries(&self) -> Vec<PathBuf> {
        fs::read_dir(self.cache.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}

pub fn sha256(path: &Path) -> Vec<u8> {
    Sha256::digest(fs::read(path).unwrap()).to_vec()
}

pub fn names(paths: &[PathBuf]) -> HashSet<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}
