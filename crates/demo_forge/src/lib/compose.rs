//! Final video composition.
//!
//! Combines the avatar intro clip, the screen recording of the course run
//! and the narration clips into a single mp4. The intro plays full screen,
//! then the recording follows with each narration clip overlaid
//! picture-in-picture in the top right corner during its time window.

use std::{
    future::Future,
    path::{Path, PathBuf},
};

use ffmpeg_bindings::{Ffmpeg, FfmpegError};

use crate::avatar::RenderedClip;

/// Overlay duration used when a clip cannot be probed.
const DEFAULT_OVERLAY_DURATION: f64 = 5.0;

/// Inputs for composing one course video.
#[derive(Debug)]
pub struct ComposeJob<'a> {
    pub intro_clip: &'a Path,
    pub browser_recording: &'a Path,
    pub overlays: &'a [RenderedClip],
    /// Seconds of full screen intro before the recording starts.
    pub intro_duration: f64,
    pub course_index: usize,
    pub session_id: &'a str,
    pub output_dir: &'a Path,
}

pub trait Compositor {
    type Error: std::fmt::Debug;

    /// Produces the final video, or `None` when composition was not possible.
    fn compose(
        &self,
        job: &ComposeJob<'_>,
    ) -> impl Future<Output = Result<Option<PathBuf>, Self::Error>>;
}

/// [`Compositor`] backed by local ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCompositor {
    ffmpeg: Ffmpeg,
}

impl FfmpegCompositor {
    pub fn new(ffmpeg: Ffmpeg) -> Self {
        Self { ffmpeg }
    }

    async fn overlay_compose(
        &self,
        job: &ComposeJob<'_>,
        overlays: &[(&RenderedClip, &Path)],
        temp_browser: &Path,
        output: &Path,
    ) -> Result<(), FfmpegError> {
        let base_has_audio = match self.ffmpeg.has_audio_stream(temp_browser).await {
            Ok(has_audio) => has_audio,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to probe recording audio, assuming none");
                false
            }
        };

        let mut inputs: Vec<PathBuf> =
            vec![job.intro_clip.to_path_buf(), temp_browser.to_path_buf()];
        let mut timings = Vec::with_capacity(overlays.len());
        for (clip, file) in overlays {
            // HeyGen renders run a little longer than the scripted duration,
            // so the actual clip length wins over the script's estimate.
            let duration = match self.ffmpeg.probe_duration(file).await {
                Ok(duration) => duration,
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        clip = %file.display(),
                        "Failed to probe clip duration, using fallback"
                    );
                    DEFAULT_OVERLAY_DURATION
                }
            };
            timings.push(OverlayTiming {
                start_time: clip.start_time,
                duration,
            });
            inputs.push(file.to_path_buf());
        }

        let filter = build_overlay_filter(&timings, job.intro_duration, base_has_audio);
        tracing::debug!(overlays = timings.len(), "Running overlay composition");
        self.ffmpeg
            .compose_with_filter(&inputs, &filter, output)
            .await
    }

    async fn concat_fallback(
        &self,
        intro: &Path,
        temp_browser: &Path,
        output: &Path,
    ) -> Result<(), FfmpegError> {
        let list_path = output.with_extension("concat.txt");
        let parts = vec![absolute_path(intro), absolute_path(temp_browser)];
        self.ffmpeg.concat_copy(&parts, &list_path, output).await
    }
}

impl Compositor for FfmpegCompositor {
    type Error = FfmpegError;

    #[tracing::instrument(
        skip_all,
        fields(course_index = job.course_index, session_id = %job.session_id)
    )]
    async fn compose(&self, job: &ComposeJob<'_>) -> Result<Option<PathBuf>, FfmpegError> {
        let output = job.output_dir.join(format!(
            "course_{}_{}_final.mp4",
            job.course_index + 1,
            job.session_id
        ));
        let temp_browser = job
            .output_dir
            .join(format!("temp_browser_{}.mp4", job.session_id));

        tracing::info!(output = %output.display(), "Composing final course video");

        // Screen captures come out of ffmpeg's grab devices in whatever the
        // display produced. Normalize to H.264 before filter-graph work.
        if let Err(err) = self
            .ffmpeg
            .transcode_to_mp4(job.browser_recording, &temp_browser)
            .await
        {
            tracing::warn!(error = %err, "Failed to prepare the screen recording for composition");
            return Ok(None);
        }

        let overlays: Vec<(&RenderedClip, &Path)> = job
            .overlays
            .iter()
            .filter_map(|clip| clip.video_file.as_deref().map(|file| (clip, file)))
            .collect();

        let result = if overlays.is_empty() {
            tracing::info!("No narration clips rendered, concatenating intro and recording");
            self.concat_fallback(job.intro_clip, &temp_browser, &output)
                .await
        } else {
            match self
                .overlay_compose(job, &overlays, &temp_browser, &output)
                .await
            {
                Ok(()) => Ok(()),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "Overlay composition failed, falling back to concatenation"
                    );
                    self.concat_fallback(job.intro_clip, &temp_browser, &output)
                        .await
                }
            }
        };

        if let Err(err) = tokio::fs::remove_file(&temp_browser).await {
            tracing::warn!(error = %err, "Failed to remove temp recording");
        }

        if let Err(err) = result {
            tracing::error!(error = %err, "Video composition failed");
            return Ok(None);
        }

        match tokio::fs::metadata(&output).await {
            Ok(meta) => {
                tracing::info!(
                    file = %output.display(),
                    size_mb = meta.len() / 1024 / 1024,
                    "Final video written"
                );
                Ok(Some(output))
            }
            Err(_) => {
                tracing::warn!("Composition produced no output file");
                Ok(None)
            }
        }
    }
}

/// Placement of one narration clip on the composed timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OverlayTiming {
    start_time: f64,
    duration: f64,
}

/// Builds the `-filter_complex` graph for the picture-in-picture pass.
///
/// Input 0 is the intro, input 1 the screen recording, inputs 2.. the
/// narration clips in `timings` order (`timings` must be non-empty). The
/// intro and recording are concatenated into a base timeline. Each clip is
/// scaled down, shifted by the intro offset and overlaid top right only
/// during its window, with its audio delayed to match and mixed over the
/// base track.
fn build_overlay_filter(
    timings: &[OverlayTiming],
    intro_duration: f64,
    base_has_audio: bool,
) -> String {
    debug_assert!(!timings.is_empty());

    let mut filter = String::from("[0:v][1:v]concat=n=2:v=1[basev];");

    if base_has_audio {
        filter.push_str("[0:a][1:a]concat=n=2:v=0:a=1[basea];");
    } else {
        filter.push_str("[0:a]acopy[basea];");
    }

    for (i, timing) in timings.iter().enumerate() {
        let input = i + 2;
        let start = timing.start_time + intro_duration;
        let end = start + timing.duration;
        let start_ms = (start * 1000.0) as i64;

        filter.push_str(&format!(
            "[{input}:v]scale=320:180,setpts=PTS+{start}/TB[v{i}];"
        ));
        filter.push_str(&format!(
            "[{input}:a]atrim=duration={duration},asetpts=PTS-STARTPTS,adelay={start_ms}|{start_ms}[a{i}];",
            duration = timing.duration
        ));

        let base = if i == 0 {
            "basev".to_owned()
        } else {
            format!("tmp{}", i - 1)
        };
        filter.push_str(&format!(
            "[{base}][v{i}]overlay=x=W-w-20:y=20:enable='between(t,{start},{end})':eof_action=pass[tmp{i}];"
        ));
    }

    filter.push_str(&format!("[tmp{}]format=yuv420p[outv];", timings.len() - 1));

    let audio_pads: String = (0..timings.len()).map(|i| format!("[a{i}]")).collect();
    filter.push_str(&format!(
        "[basea]{audio_pads}amix=inputs={}:duration=longest[outa]",
        timings.len() + 1
    ));

    filter
}

fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
