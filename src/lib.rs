//! voladjust - peak gain and two-pass loudness normalization
//!
//! Adjusts the volume of audio files in place, either by moving the sample
//! peak onto a target level or by EBU R128 loudness normalization. The
//! actual decoding, filtering and encoding is done by an external engine
//! (ffmpeg); this crate decides what to ask it, reads what it reports and
//! makes sure originals are only ever replaced atomically.
//!
//! # Flow
//!
//! [`walker::TreeWalker`] → [`processor::FileProcessor`] →
//! [`gain`] or [`analyzer`] + [`normalizer`] → [`staging::StagingArea::commit`]

pub mod analyzer;
pub mod classify;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod gain;
pub mod normalizer;
pub mod processor;
pub mod report;
pub mod staging;
pub mod walker;

pub use config::{MeasurementProfile, Mode, RunConfig, Targets};
pub use error::{Result, VolumeError};
pub use report::{BatchResult, ProcessingOutcome};
