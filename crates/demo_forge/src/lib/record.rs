//! Screen recording of live browser sessions.
//!
//! Browser-Use exposes a live view URL per session. The ffmpeg recorder
//! opens it in the local default browser and captures the screen while the
//! agent works; the capture is cut as soon as the driving task finishes.

use std::{
    future::Future,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use ffmpeg_bindings::{CaptureHandle, Ffmpeg, FfmpegError};

/// Extra capture time past the expected task duration.
const CAPTURE_BUFFER: Duration = Duration::from_secs(30);

/// How long the live view gets to load before capture starts.
const BROWSER_WARMUP: Duration = Duration::from_secs(5);

pub trait SessionRecorder {
    type Handle: RecordingHandle;
    type Error: std::fmt::Debug;

    /// Starts recording the session's live view into `output`.
    fn start(
        &self,
        live_url: &str,
        output: &Path,
        expected_duration: Duration,
    ) -> impl Future<Output = Result<Self::Handle, Self::Error>>;
}

/// A recording in progress.
pub trait RecordingHandle {
    /// Stops the recording and returns the file, or `None` when nothing
    /// usable was captured.
    fn stop(self) -> impl Future<Output = Option<PathBuf>>;
}

/// Records by opening the live URL in the system browser and capturing the
/// screen with ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegScreenRecorder {
    ffmpeg: Ffmpeg,
}

impl FfmpegScreenRecorder {
    pub fn new(ffmpeg: Ffmpeg) -> Self {
        Self { ffmpeg }
    }
}

impl SessionRecorder for FfmpegScreenRecorder {
    type Handle = ScreenRecording;
    type Error = FfmpegError;

    #[tracing::instrument(skip(self))]
    async fn start(
        &self,
        live_url: &str,
        output: &Path,
        expected_duration: Duration,
    ) -> Result<ScreenRecording, FfmpegError> {
        open_in_browser(live_url);
        tokio::time::sleep(BROWSER_WARMUP).await;

        let capture = self
            .ffmpeg
            .start_screen_capture(output, expected_duration + CAPTURE_BUFFER)
            .await?;
        Ok(ScreenRecording { capture })
    }
}

pub struct ScreenRecording {
    capture: CaptureHandle,
}

impl RecordingHandle for ScreenRecording {
    async fn stop(self) -> Option<PathBuf> {
        match self.capture.stop().await {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to stop screen capture");
                None
            }
        }
    }
}

/// Recorder that records nothing; used when video capture is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

pub struct NoopRecording;

impl SessionRecorder for NoopRecorder {
    type Handle = NoopRecording;
    type Error = std::convert::Infallible;

    async fn start(
        &self,
        live_url: &str,
        _output: &Path,
        _expected_duration: Duration,
    ) -> Result<NoopRecording, Self::Error> {
        tracing::debug!(live_url, "Recording disabled, skipping capture");
        Ok(NoopRecording)
    }
}

impl RecordingHandle for NoopRecording {
    async fn stop(self) -> Option<PathBuf> {
        None
    }
}

/// Opens `url` in the platform's default browser, best effort.
fn open_in_browser(url: &str) {
    match open_command(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(mut child) => {
            // reap the opener so it does not linger as a zombie
            tokio::spawn(async move {
                let _ = child.wait().await;
            });
        }
        Err(err) => tracing::warn!(error = %err, "Failed to open live view in a browser"),
    }
}

#[cfg(target_os = "macos")]
fn open_command(url: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("open");
    cmd.arg(url);
    cmd
}

#[cfg(target_os = "windows")]
fn open_command(url: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("cmd");
    cmd.args(["/C", "start", "", url]);
    cmd
}

#[cfg(all(unix, not(target_os = "macos")))]
fn open_command(url: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("xdg-open");
    cmd.arg(url);
    cmd
}
