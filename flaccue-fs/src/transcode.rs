use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use which::which;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error(transparent)]
    ExecutableNotFound(#[from] which::Error),

    #[error("transcoder exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("transcoder produced no output")]
    EmptyOutput,

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

/// Tags written into a decoded track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMeta {
    pub artist: String,
    pub album: String,
    pub disc: u32,
    pub track: u32,
    pub title: String,
}

/// Decodes a window of a backing file into one complete WAV byte buffer.
pub trait Transcoder: Send + Sync {
    fn transcode(
        &self,
        input: &Path,
        start: f64,
        end: f64,
        meta: &TrackMeta,
    ) -> Result<Vec<u8>, TranscodeError>;
}

/// [Transcoder] backed by an external `ffmpeg` process writing WAV to a
/// pipe.
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new() -> Result<Self, TranscodeError> {
        Ok(Self {
            program: which("ffmpeg")?,
        })
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(
        &self,
        input: &Path,
        start: f64,
        end: f64,
        meta: &TrackMeta,
    ) -> Result<Vec<u8>, TranscodeError> {
        log::debug!("decoding {} window [{start}, {end})", input.display());

        let output = Command::new(&self.program)
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(input)
            .arg("-ss")
            .arg(start.to_string())
            .arg("-to")
            .arg(end.to_string())
            .arg("-metadata")
            .arg(format!("artist={}", meta.artist))
            .arg("-metadata")
            .arg(format!("album={}", meta.album))
            .arg("-metadata")
            .arg(format!("disc={}", meta.disc))
            .arg("-metadata")
            .arg(format!("track={}", meta.track))
            .arg("-metadata")
            .arg(format!("title={}", meta.title))
            .arg("-f")
            .arg("wav")
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            return Err(TranscodeError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        if output.stdout.is_empty() {
            return Err(TranscodeError::EmptyOutput);
        }
        Ok(output.stdout)
    }
}
