//! Loudness measurement pass
//!
//! The engine prints its loudness statistics as a JSON object in the middle
//! of its diagnostic output. The object is located by brace depth, then
//! its fields are read with serde.

use log::debug;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::classify::AudioFile;
use crate::config::MeasurementProfile;
use crate::engine::{AudioEngine, Invocation, LoudnormFilter};
use crate::error::{Result, VolumeError};
use crate::gain::parse_level;

/// Statistics of one measurement pass over one file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessStats {
    /// Integrated loudness (LUFS)
    #[serde(deserialize_with = "level")]
    pub input_i: f64,
    /// True peak (dBTP)
    #[serde(deserialize_with = "level")]
    pub input_tp: f64,
    /// Loudness range (LU)
    #[serde(deserialize_with = "level")]
    pub input_lra: f64,
    /// Gating threshold (LUFS)
    #[serde(deserialize_with = "level")]
    pub input_thresh: f64,
    /// Offset gain for the correction pass (LU)
    #[serde(deserialize_with = "level")]
    pub target_offset: f64,
}

impl LoudnessStats {
    fn non_finite_field(&self) -> Option<(&'static str, f64)> {
        [
            ("input_i", self.input_i),
            ("input_tp", self.input_tp),
            ("input_lra", self.input_lra),
            ("input_thresh", self.input_thresh),
            ("target_offset", self.target_offset),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
    }
}

/// The engine writes numbers as JSON strings; accept either form.
fn level<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Level {
        Number(f64),
        Text(String),
    }

    match Level::deserialize(deserializer)? {
        Level::Number(value) => Ok(value),
        Level::Text(text) => {
            parse_level(&text).ok_or_else(|| D::Error::custom(format!("not a number: '{}'", text)))
        }
    }
}

/// Brace-balanced `{...}` blocks of `text`, in order of appearance.
pub fn json_blocks(text: &str) -> JsonBlocks<'_> {
    JsonBlocks { text, pos: 0 }
}

/// The first brace-balanced block of `text`, noise around it ignored.
pub fn extract_json_block(text: &str) -> Option<&str> {
    json_blocks(text).next()
}

pub struct JsonBlocks<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for JsonBlocks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = &self.text[self.pos..];
        let start = self.pos + rest.find('{')?;

        let mut depth = 0usize;
        for (offset, ch) in self.text[start..].char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = start + offset + 1;
                        self.pos = end;
                        return Some(&self.text[start..end]);
                    }
                }
                _ => {}
            }
        }

        // Unbalanced: nothing more can close.
        self.pos = self.text.len();
        None
    }
}

/// Read loudness statistics out of the engine's diagnostic output.
///
/// Takes the first balanced block that carries the statistics fields, so a
/// stray brace pair in earlier log lines does not hide the real block.
pub fn parse_statistics(diagnostics: &str) -> std::result::Result<LoudnessStats, String> {
    let mut last_error = None;
    for block in json_blocks(diagnostics) {
        match serde_json::from_str::<LoudnessStats>(block) {
            Ok(stats) => return Ok(stats),
            Err(e) => last_error = Some(e.to_string()),
        }
    }
    Err(match last_error {
        Some(e) => format!("malformed statistics block: {}", e),
        None => "no statistics block in engine output".to_string(),
    })
}

/// Run the measurement pass against the reference `profile`.
pub fn analyze(
    engine: &dyn AudioEngine,
    file: &AudioFile,
    profile: &MeasurementProfile,
) -> Result<LoudnessStats> {
    let output = engine.execute(&Invocation::MeasureLoudness {
        input: file.path.clone(),
        filter: LoudnormFilter::measurement(profile),
    })?;

    let analysis_error = |reason: String| VolumeError::AnalysisError {
        path: file.path.clone(),
        reason,
    };

    if !output.success {
        return Err(analysis_error(output.failure_summary()));
    }

    let stats = parse_statistics(&output.stderr)
        .or_else(|_| parse_statistics(&output.stdout))
        .map_err(analysis_error)?;

    if let Some((field, value)) = stats.non_finite_field() {
        return Err(analysis_error(format!(
            "{} is {} (silent or too short input)",
            field, value
        )));
    }

    debug!(
        "Measured {}: I={} LUFS, TP={} dBTP, LRA={} LU, thresh={}, offset={}",
        file.path.display(),
        stats.input_i,
        stats.input_tp,
        stats.input_lra,
        stats.input_thresh,
        stats.target_offset
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LOUDNORM_OUTPUT: &str = r#"Input #0, mp3, from 'song.mp3':
  Duration: 00:03:12.01, start: 0.025057, bitrate: 320 kb/s
Stream mapping:
  Stream #0:0 -> #0:0 (mp3 (mp3float) -> pcm_s16le (native))
size=N/A time=00:03:12.00 bitrate=N/A speed= 140x
[Parsed_loudnorm_0 @ 0x5566e1c0b880]
{
	"input_i" : "-9.84",
	"input_tp" : "0.41",
	"input_lra" : "5.60",
	"input_thresh" : "-20.06",
	"output_i" : "-16.29",
	"output_tp" : "-1.50",
	"output_lra" : "4.10",
	"output_thresh" : "-26.41",
	"normalization_type" : "dynamic",
	"target_offset" : "0.29"
}
video:0kB audio:33075kB subtitle:0kB other streams:0kB
"#;

    #[test]
    fn test_extract_block_ignores_noise() {
        let block = extract_json_block(LOUDNORM_OUTPUT).unwrap();
        assert!(block.starts_with('{'));
        assert!(block.ends_with('}'));
        assert!(block.contains("\"target_offset\" : \"0.29\""));
        assert!(!block.contains("video:0kB"));
    }

    #[test]
    fn test_extract_block_with_nested_braces() {
        let text = "noise line\n[info] before\n{\"a\": {\"b\": {\"c\": 1}}, \"d\": 2}\ntrailing } noise {";
        assert_eq!(
            extract_json_block(text),
            Some("{\"a\": {\"b\": {\"c\": 1}}, \"d\": 2}")
        );
    }

    #[test]
    fn test_extract_block_missing_or_unbalanced() {
        assert_eq!(extract_json_block("no structured output here"), None);
        assert_eq!(extract_json_block(""), None);
        assert_eq!(extract_json_block("{ \"input_i\": \"-9\""), None);
    }

    #[test]
    fn test_parse_statistics_from_engine_output() {
        let stats = parse_statistics(LOUDNORM_OUTPUT).unwrap();
        assert_eq!(
            stats,
            LoudnessStats {
                input_i: -9.84,
                input_tp: 0.41,
                input_lra: 5.60,
                input_thresh: -20.06,
                target_offset: 0.29,
            }
        );
    }

    #[test]
    fn test_parse_statistics_skips_unrelated_block() {
        let text = format!("title : {{live}}\n{}", LOUDNORM_OUTPUT);
        let stats = parse_statistics(&text).unwrap();
        assert_eq!(stats.input_i, -9.84);
    }

    #[test]
    fn test_parse_statistics_accepts_numbers_and_bare_decimals() {
        let text = r#"{"input_i": -23.5, "input_tp": "-.5", "input_lra": 7, "input_thresh": "-34", "target_offset": ".25"}"#;
        let stats = parse_statistics(text).unwrap();
        assert_eq!(stats.input_tp, -0.5);
        assert_eq!(stats.input_lra, 7.0);
        assert_eq!(stats.target_offset, 0.25);
    }

    #[test]
    fn test_parse_statistics_errors() {
        let err = parse_statistics("[info] nothing structured").unwrap_err();
        assert!(err.contains("no statistics block"));

        let err = parse_statistics(r#"{"input_i": "-9.8"}"#).unwrap_err();
        assert!(err.contains("malformed"));
    }

    #[test]
    fn test_silent_input_is_not_finite() {
        let text = r#"{"input_i": "-inf", "input_tp": "-inf", "input_lra": "0.00", "input_thresh": "-70.00", "target_offset": "inf"}"#;
        let stats = parse_statistics(text).unwrap();
        assert_eq!(stats.non_finite_field().map(|(f, _)| f), Some("input_i"));
    }
}
