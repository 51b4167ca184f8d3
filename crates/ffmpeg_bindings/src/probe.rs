use std::{ffi::OsString, path::Path, process::Stdio};

use tokio::process::Command;

use crate::{Ffmpeg, FfmpegError};

impl Ffmpeg {
    /// Returns the container duration of `media` in seconds.
    pub async fn probe_duration(&self, media: &Path) -> Result<f64, FfmpegError> {
        let stdout = self.run_ffprobe(duration_args(media)).await?;
        stdout
            .trim()
            .parse::<f64>()
            .map_err(|e| FfmpegError::OutputParse {
                tool: self.ffprobe_bin.to_string_lossy().into_owned(),
                message: format!("duration `{}`: {e}", stdout.trim()),
            })
    }

    /// True when `media` carries at least one audio stream.
    pub async fn has_audio_stream(&self, media: &Path) -> Result<bool, FfmpegError> {
        let stdout = self.run_ffprobe(audio_stream_args(media)).await?;
        Ok(stdout.contains("audio"))
    }

    async fn run_ffprobe(&self, args: Vec<OsString>) -> Result<String, FfmpegError> {
        let tool = self.ffprobe_bin.to_string_lossy().into_owned();
        let output = Command::new(&self.ffprobe_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| FfmpegError::from_spawn(&tool, e))?;

        if !output.status.success() {
            return Err(FfmpegError::CommandFailed {
                tool,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn duration_args(media: &Path) -> Vec<OsString> {
    vec![
        "-v".into(),
        "error".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        media.into(),
    ]
}

fn audio_stream_args(media: &Path) -> Vec<OsString> {
    vec![
        "-v".into(),
        "error".into(),
        "-select_streams".into(),
        "a".into(),
        "-show_entries".into(),
        "stream=codec_type".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        media.into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_args_select_only_the_container_duration() {
        let args: Vec<String> = duration_args(Path::new("clip.mp4"))
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                "clip.mp4"
            ]
        );
    }

    #[test]
    fn audio_stream_args_select_audio_codec_type() {
        let args: Vec<String> = audio_stream_args(Path::new("clip.mp4"))
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.windows(2).any(|w| w == ["-select_streams", "a"]));
        assert!(args.contains(&"stream=codec_type".to_string()));
    }
}
