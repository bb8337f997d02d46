//! File classification
//!
//! Decides whether a path is processable and whether its audio is lossy or
//! lossless. Eligibility is decided by extension alone; the codec is read
//! from the engine's stream metadata.

use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::{AudioEngine, Invocation};
use crate::error::{Result, VolumeError};

/// Codec names treated as lossy.
pub const LOSSY_CODECS: &[&str] = &["mp3", "ogg", "aac", "m4a", "opus"];

/// Names the engine reports for the lossy codecs above.
const LOSSY_CODEC_ALIASES: &[&str] = &[
    "vorbis",
    "libvorbis",
    "mp3float",
    "mp3adu",
    "mp3on4",
    "libmp3lame",
    "aac_latm",
    "aac_fixed",
    "libfdk_aac",
    "libopus",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Lossy,
    Lossless,
}

impl Codec {
    /// Classify an engine codec name.
    pub fn from_codec_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        if LOSSY_CODECS.contains(&name.as_str()) || LOSSY_CODEC_ALIASES.contains(&name.as_str()) {
            Codec::Lossy
        } else {
            Codec::Lossless
        }
    }

    /// Classification implied by a supported file extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "mp3" | "aac" | "ogg" | "m4a" | "opus" => Some(Codec::Lossy),
            "flac" | "wav" => Some(Codec::Lossless),
            _ => None,
        }
    }

    pub fn is_lossy(&self) -> bool {
        matches!(self, Codec::Lossy)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Lossy => write!(f, "lossy"),
            Codec::Lossless => write!(f, "lossless"),
        }
    }
}

/// A classified, processable audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFile {
    pub path: PathBuf,
    /// Lowercase extension without the dot
    pub extension: String,
    pub codec: Codec,
    /// Codec name as reported by the engine
    pub codec_name: String,
    pub sample_rate: Option<u32>,
    /// Nominal bitrate in bits per second, when the engine reports one
    pub bit_rate: Option<u64>,
}

impl AudioFile {
    /// Bitrate to request when re-encoding. Only lossy codecs have one
    /// worth keeping; lossless encoders ignore it.
    pub fn encode_bit_rate(&self) -> Option<u64> {
        self.bit_rate.filter(|_| self.codec.is_lossy())
    }

    /// Base name used to key the staging artifact.
    pub fn file_name(&self) -> &std::ffi::OsStr {
        self.path.file_name().unwrap_or(self.path.as_os_str())
    }
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_name: Option<String>,
    sample_rate: Option<String>,
    bit_rate: Option<String>,
}

/// Lowercase extension of `path` if it is one of `extensions`.
pub fn eligible_extension(path: &Path, extensions: &[String]) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    extensions
        .iter()
        .any(|e| *e == extension)
        .then_some(extension)
}

/// Classify `path`, querying the engine for its codec.
///
/// Errors are per-file: the caller records them and moves on.
pub fn classify(engine: &dyn AudioEngine, path: &Path, extensions: &[String]) -> Result<AudioFile> {
    if !path.is_file() {
        return Err(VolumeError::UnsupportedFile {
            path: path.to_path_buf(),
            reason: "not an existing regular file".to_string(),
        });
    }

    let extension =
        eligible_extension(path, extensions).ok_or_else(|| VolumeError::UnsupportedFile {
            path: path.to_path_buf(),
            reason: match path.extension() {
                Some(ext) => format!("extension '{}' is not supported", ext.to_string_lossy()),
                None => "no file extension".to_string(),
            },
        })?;

    let output = engine.execute(&Invocation::ProbeStream {
        input: path.to_path_buf(),
    })?;
    if !output.success {
        return Err(VolumeError::ClassificationError {
            path: path.to_path_buf(),
            reason: output.failure_summary(),
        });
    }

    let report: ProbeReport =
        serde_json::from_str(&output.stdout).map_err(|e| VolumeError::ClassificationError {
            path: path.to_path_buf(),
            reason: format!("unreadable stream metadata: {}", e),
        })?;

    let stream = report
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| VolumeError::ClassificationError {
            path: path.to_path_buf(),
            reason: "no audio stream".to_string(),
        })?;

    let codec_name = stream
        .codec_name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| VolumeError::ClassificationError {
            path: path.to_path_buf(),
            reason: "audio stream has no codec name".to_string(),
        })?;

    let codec = Codec::from_codec_name(&codec_name);
    let sample_rate = stream.sample_rate.and_then(|r| r.trim().parse().ok());
    let bit_rate = stream
        .bit_rate
        .and_then(|r| r.trim().parse().ok())
        .filter(|&r: &u64| r > 0);

    debug!(
        "Classified {} as {} ({}, {:?} Hz)",
        path.display(),
        codec,
        codec_name,
        sample_rate
    );

    Ok(AudioFile {
        path: path.to_path_buf(),
        extension,
        codec,
        codec_name,
        sample_rate,
        bit_rate,
    })
}
