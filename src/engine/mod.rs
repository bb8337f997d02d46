//! Audio engine adapter
//!
//! All decoding, filtering and encoding is delegated to an external engine.
//! Callers describe what they need as an [`Invocation`] and get the raw
//! [`EngineOutput`] back; the text parsing lives next to each caller
//! (`gain`, `analyzer`, `classify`) so the engine itself stays swappable.

pub mod ffmpeg;
pub mod filters;

use std::path::{Path, PathBuf};

use crate::error::Result;

pub use ffmpeg::FfmpegEngine;
pub use filters::{AudioFilter, LoudnormFilter, PrintFormat};

/// One request to the external engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// Stream metadata of the first audio stream (codec, sample rate, bitrate)
    ProbeStream { input: PathBuf },
    /// Whole-file sample peak detection
    DetectPeak { input: PathBuf },
    /// Measurement-only loudness pass; nothing is written
    MeasureLoudness { input: PathBuf, filter: LoudnormFilter },
    /// Filter `input` into a new file at `output`
    ApplyFilter {
        input: PathBuf,
        output: PathBuf,
        filter: AudioFilter,
        sample_rate: Option<u32>,
        /// Audio bitrate for lossy re-encodes, in bits per second
        bit_rate: Option<u64>,
    },
}

impl Invocation {
    /// The file the invocation reads.
    pub fn input(&self) -> &Path {
        match self {
            Invocation::ProbeStream { input }
            | Invocation::DetectPeak { input }
            | Invocation::MeasureLoudness { input, .. }
            | Invocation::ApplyFilter { input, .. } => input,
        }
    }

    /// The file the invocation writes, if any.
    pub fn output(&self) -> Option<&Path> {
        match self {
            Invocation::ApplyFilter { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Short label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Invocation::ProbeStream { .. } => "probe",
            Invocation::DetectPeak { .. } => "peak detection",
            Invocation::MeasureLoudness { .. } => "loudness measurement",
            Invocation::ApplyFilter {
                filter: AudioFilter::Volume { .. },
                ..
            } => "gain",
            Invocation::ApplyFilter {
                filter: AudioFilter::Loudnorm(_),
                ..
            } => "loudness correction",
        }
    }
}

/// Captured result of one engine run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    /// Diagnostic stream; ffmpeg reports filter results here
    pub stderr: String,
}

impl EngineOutput {
    pub fn success(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Short description of a failed run for error messages.
    pub fn failure_summary(&self) -> String {
        let status = match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        match self.stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(line) => format!("{}: {}", status, line.trim()),
            None => status,
        }
    }
}

/// An external audio decode/filter/encode engine.
pub trait AudioEngine {
    /// Display name for messages
    fn name(&self) -> &str;

    /// Fails with `DependencyMissing` if the engine cannot be run at all.
    fn ensure_available(&self) -> Result<()>;

    /// Run one invocation to completion.
    ///
    /// A non-zero exit is reported through [`EngineOutput::success`], not as
    /// an error; errors mean the engine could not be run or was stopped.
    fn execute(&self, invocation: &Invocation) -> Result<EngineOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_summary_uses_last_line() {
        let output = EngineOutput::failure(1, "header\ninput.mp3: Invalid data found\n\n");
        assert_eq!(
            output.failure_summary(),
            "exit status 1: input.mp3: Invalid data found"
        );
    }

    #[test]
    fn test_failure_summary_without_diagnostics() {
        let output = EngineOutput {
            success: false,
            exit_code: None,
            ..Default::default()
        };
        assert_eq!(output.failure_summary(), "terminated by signal");
    }

    #[test]
    fn test_invocation_accessors() {
        let invocation = Invocation::ApplyFilter {
            input: PathBuf::from("a.flac"),
            output: PathBuf::from("/stage/a.flac"),
            filter: AudioFilter::Volume { gain_db: 1.5 },
            sample_rate: None,
            bit_rate: None,
        };
        assert_eq!(invocation.input(), Path::new("a.flac"));
        assert_eq!(invocation.output(), Some(Path::new("/stage/a.flac")));
        assert_eq!(invocation.label(), "gain");

        let probe = Invocation::ProbeStream {
            input: PathBuf::from("a.flac"),
        };
        assert!(probe.output().is_none());
    }
}
