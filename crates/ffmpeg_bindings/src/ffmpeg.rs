use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

use crate::FfmpegError;

/// Handle to the `ffmpeg`/`ffprobe` binaries.
///
/// By default both tools are resolved from `PATH`. All operations run the
/// tools as child processes and surface non-zero exits as
/// [`FfmpegError::CommandFailed`] with the captured stderr tail.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    pub(crate) ffmpeg_bin: PathBuf,
    pub(crate) ffprobe_bin: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
        }
    }
}

impl Ffmpeg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses explicit binary paths instead of resolving from `PATH`.
    pub fn with_binaries(ffmpeg_bin: impl Into<PathBuf>, ffprobe_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    /// Re-encodes `input` to an H.264 mp4 suitable for filter-graph work.
    #[tracing::instrument(skip(self))]
    pub async fn transcode_to_mp4(&self, input: &Path, output: &Path) -> Result<(), FfmpegError> {
        self.run_ffmpeg(transcode_args(input, output)).await
    }

    /// Concatenates `parts` into `output` with stream copy (no re-encode).
    ///
    /// Writes an ffmpeg concat demuxer list to `list_path` and removes it
    /// again once the command has finished.
    #[tracing::instrument(skip(self, parts))]
    pub async fn concat_copy(
        &self,
        parts: &[PathBuf],
        list_path: &Path,
        output: &Path,
    ) -> Result<(), FfmpegError> {
        tokio::fs::write(list_path, concat_list_contents(parts)).await?;
        let result = self.run_ffmpeg(concat_args(list_path, output)).await;
        if let Err(err) = tokio::fs::remove_file(list_path).await {
            tracing::warn!(error = %err, "Failed to remove concat list file");
        }
        result
    }

    /// Runs a full `-filter_complex` composition over `inputs`, mapping the
    /// `[outv]`/`[outa]` pads the filter graph is expected to produce.
    #[tracing::instrument(skip(self, inputs, filter))]
    pub async fn compose_with_filter(
        &self,
        inputs: &[PathBuf],
        filter: &str,
        output: &Path,
    ) -> Result<(), FfmpegError> {
        self.run_ffmpeg(compose_args(inputs, filter, output)).await
    }

    async fn run_ffmpeg(&self, args: Vec<OsString>) -> Result<(), FfmpegError> {
        let tool = self.ffmpeg_bin.to_string_lossy().into_owned();
        let output = Command::new(&self.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| FfmpegError::from_spawn(&tool, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FfmpegError::CommandFailed {
                tool,
                status: output.status,
                stderr: stderr_tail(&stderr).to_owned(),
            });
        }
        Ok(())
    }
}

/// Keeps only the end of ffmpeg's stderr, which is where the actual error is.
fn stderr_tail(stderr: &str) -> &str {
    const MAX_LEN: usize = 2048;
    let trimmed = stderr.trim_end();
    match trimmed.char_indices().nth_back(MAX_LEN.saturating_sub(1)) {
        Some((idx, _)) => &trimmed[idx..],
        None => trimmed,
    }
}

fn transcode_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-i".into(),
        input.into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "fast".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
    ];
    args.push(output.into());
    args
}

fn concat_args(list_path: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_path.into(),
        "-c".into(),
        "copy".into(),
        output.into(),
    ]
}

fn compose_args(inputs: &[PathBuf], filter: &str, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into()];
    for input in inputs {
        args.push("-i".into());
        args.push(input.into());
    }
    args.extend([
        "-filter_complex".into(),
        filter.into(),
        "-map".into(),
        "[outv]".into(),
        "-map".into(),
        "[outa]".into(),
        "-c:v".into(),
        "libx264".into(),
        "-c:a".into(),
        "aac".into(),
        "-preset".into(),
        "fast".into(),
    ]);
    args.push(output.into());
    args
}

/// Renders the concat demuxer list. Single quotes in paths are escaped the
/// way the demuxer expects (`'\''`).
fn concat_list_contents(parts: &[PathBuf]) -> String {
    let mut contents = String::new();
    for part in parts {
        let escaped = part.to_string_lossy().replace('\'', r"'\''");
        contents.push_str(&format!("file '{escaped}'\n"));
    }
    contents
}
