//! ffmpeg/ffprobe subprocess engine
//!
//! Each invocation spawns one blocking subprocess. Output pipes are drained
//! on helper threads so a chatty engine never stalls on a full pipe while we
//! wait for it, and an optional deadline kills the subprocess.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use super::{AudioEngine, EngineOutput, Invocation};
use crate::config::EngineConfig;
use crate::error::{Result, VolumeError};

/// Output formats whose muxers take an attached picture stream.
const COVER_ART_FORMATS: &[&str] = &["mp3", "flac", "m4a"];

/// How often a running subprocess is polled when a timeout is set.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Engine backed by the `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Option<Duration>,
}

impl FfmpegEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg.clone(),
            ffprobe: config.ffprobe.clone(),
            timeout: config.timeout,
        }
    }

    /// Program and argument list for an invocation.
    pub fn command_line(&self, invocation: &Invocation) -> (&Path, Vec<OsString>) {
        let mut args: Vec<OsString> = Vec::new();
        match invocation {
            Invocation::ProbeStream { input } => {
                args.extend(
                    [
                        "-v",
                        "error",
                        "-select_streams",
                        "a:0",
                        "-show_entries",
                        "stream=codec_name,sample_rate,bit_rate",
                        "-of",
                        "json",
                    ]
                    .map(OsString::from),
                );
                args.push(input.into());
                return (self.ffprobe.as_path(), args);
            }
            Invocation::DetectPeak { input } => {
                push_input(&mut args, input, false);
                args.extend(
                    ["-map", "0:a:0", "-af", "volumedetect", "-f", "null", "-"].map(OsString::from),
                );
            }
            Invocation::MeasureLoudness { input, filter } => {
                push_input(&mut args, input, false);
                args.extend(["-map", "0:a:0", "-af"].map(OsString::from));
                args.push(filter.to_string().into());
                args.extend(["-f", "null", "-"].map(OsString::from));
            }
            Invocation::ApplyFilter {
                input,
                output,
                filter,
                sample_rate,
                bit_rate,
            } => {
                push_input(&mut args, input, true);
                args.extend(["-map", "0:a"].map(OsString::from));
                // Ogg rejects a copied picture stream, so cover art is only
                // carried where the muxer stores it.
                if keeps_cover_art(output) {
                    args.extend(["-map", "0:v?", "-c:v", "copy"].map(OsString::from));
                }
                args.extend(["-map_metadata", "0", "-af"].map(OsString::from));
                args.push(filter.to_string().into());
                if let Some(rate) = sample_rate {
                    args.push("-ar".into());
                    args.push(rate.to_string().into());
                }
                if let Some(rate) = bit_rate {
                    args.push("-b:a".into());
                    args.push(rate.to_string().into());
                }
                args.push(output.into());
            }
        }
        (self.ffmpeg.as_path(), args)
    }

    fn run(&self, program: &Path, args: &[OsString]) -> Result<EngineOutput> {
        debug!("Running {} {:?}", program.display(), args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VolumeError::EngineSpawn {
                program: program.display().to_string(),
                source: e,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_reader = thread::spawn(move || drain(stdout));
        let stderr_reader = thread::spawn(move || drain(stderr));

        let status = match self.timeout {
            None => Some(child.wait()?),
            Some(limit) => wait_with_deadline(&mut child, limit)?,
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        let status = status.ok_or_else(|| VolumeError::EngineTimeout {
            program: program.display().to_string(),
            timeout_secs: self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
        })?;

        Ok(EngineOutput {
            success: status.success(),
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    fn check_program(&self, program: &Path) -> Result<()> {
        let missing = |source: Option<std::io::Error>| VolumeError::DependencyMissing {
            program: program.display().to_string(),
            source,
        };

        let status = Command::new(program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| missing(Some(e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(missing(None))
        }
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl AudioEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn ensure_available(&self) -> Result<()> {
        self.check_program(&self.ffmpeg)?;
        self.check_program(&self.ffprobe)
    }

    fn execute(&self, invocation: &Invocation) -> Result<EngineOutput> {
        let (program, args) = self.command_line(invocation);
        self.run(program, &args)
    }
}

fn keeps_cover_art(output: &Path) -> bool {
    output
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| {
            COVER_ART_FORMATS.contains(&e.to_ascii_lowercase().as_str())
        })
}

fn push_input(args: &mut Vec<OsString>, input: &Path, overwrite: bool) {
    args.extend(["-hide_banner", "-nostdin"].map(OsString::from));
    if overwrite {
        args.push("-y".into());
    }
    args.push("-i".into());
    args.push(input.into());
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

/// Wait for `child`, killing it once `limit` has elapsed.
///
/// Returns `None` when the child was killed.
fn wait_with_deadline(child: &mut Child, limit: Duration) -> Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
