use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::{io::AsyncWriteExt, process::Command};

use crate::{Ffmpeg, FfmpegError};

/// Captures shorter than this are treated as failed recordings.
const MIN_CAPTURE_BYTES: u64 = 1000;

const CAPTURE_FRAMERATE: &str = "30";

impl Ffmpeg {
    /// Starts recording the desktop to `output`.
    ///
    /// The capture stops on its own after `max_duration`, or earlier when
    /// [`CaptureHandle::stop`] is called.
    #[tracing::instrument(skip(self))]
    pub async fn start_screen_capture(
        &self,
        output: &Path,
        max_duration: Duration,
    ) -> Result<CaptureHandle, FfmpegError> {
        let tool = self.ffmpeg_bin.to_string_lossy().into_owned();
        let child = Command::new(&self.ffmpeg_bin)
            .args(capture_args(output, max_duration))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| FfmpegError::from_spawn(&tool, e))?;

        tracing::info!(output = %output.display(), "Screen capture started");
        Ok(CaptureHandle {
            child,
            output: output.to_path_buf(),
        })
    }
}

/// A running screen capture. Dropping the handle leaves ffmpeg to its `-t`
/// limit; call [`CaptureHandle::stop`] for a clean early shutdown.
#[derive(Debug)]
pub struct CaptureHandle {
    child: tokio::process::Child,
    output: PathBuf,
}

impl CaptureHandle {
    /// Stops the capture and returns the recording path, or `None` when the
    /// produced file is missing or too small to be a usable video.
    ///
    /// ffmpeg is asked to quit via `q` on stdin so that it finalizes the
    /// container; only if it ignores that for 10 seconds is it killed.
    pub async fn stop(mut self) -> Result<Option<PathBuf>, FfmpegError> {
        if let Some(stdin) = self.child.stdin.as_mut() {
            let _ = stdin.write_all(b"q").await;
            let _ = stdin.flush().await;
        }

        match tokio::time::timeout(Duration::from_secs(10), self.child.wait()).await {
            Ok(status) => {
                status?;
            }
            Err(_) => {
                tracing::warn!("ffmpeg did not stop after `q`, killing the capture");
                self.child.kill().await?;
            }
        }

        match tokio::fs::metadata(&self.output).await {
            Ok(meta) if meta.len() > MIN_CAPTURE_BYTES => Ok(Some(self.output)),
            Ok(meta) => {
                tracing::warn!(
                    bytes = meta.len(),
                    output = %self.output.display(),
                    "Capture file too small, discarding"
                );
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Capture file missing");
                Ok(None)
            }
        }
    }
}

fn capture_args(output: &Path, max_duration: Duration) -> Vec<OsString> {
    let (format, device) = capture_source();
    vec![
        "-y".into(),
        "-f".into(),
        format.into(),
        "-framerate".into(),
        CAPTURE_FRAMERATE.into(),
        "-i".into(),
        device.into(),
        "-vcodec".into(),
        "libx264".into(),
        "-preset".into(),
        "ultrafast".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-t".into(),
        max_duration.as_secs().to_string().into(),
        output.into(),
    ]
}

#[cfg(target_os = "linux")]
fn capture_source() -> (&'static str, String) {
    let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0.0".into());
    ("x11grab", display)
}

#[cfg(target_os = "macos")]
fn capture_source() -> (&'static str, String) {
    ("avfoundation", "1".into())
}

#[cfg(target_os = "windows")]
fn capture_source() -> (&'static str, String) {
    ("gdigrab", "desktop".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_args_record_at_ultrafast_with_a_time_limit() {
        let args: Vec<String> = capture_args(Path::new("video.mp4"), Duration::from_secs(150))
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[0], "-y");
        assert!(args.windows(2).any(|w| w == ["-framerate", "30"]));
        assert!(args.windows(2).any(|w| w == ["-preset", "ultrafast"]));
        assert!(args.windows(2).any(|w| w == ["-t", "150"]));
        assert_eq!(args.last().unwrap(), "video.mp4");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_capture_grabs_the_x11_display() {
        let (format, _device) = capture_source();
        assert_eq!(format, "x11grab");
    }
}
