//! Avatar clip rendering.
//!
//! Narration scripts become short talking-head videos: one full-frame intro
//! and a small clip per narration segment, later overlaid on the demo
//! recording picture-in-picture.

mod heygen;

use std::{
    future::Future,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

pub use heygen::{
    AvatarGroup, AvatarGroupList, AvatarSummary, HeyGenClient, HeyGenError, VoiceSummary,
};

use crate::script::{ScriptSegment, SegmentKind, VideoScript};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    /// Full-frame 1280x720 opener.
    Intro,
    /// 320x180 picture-in-picture overlay.
    Narration,
}

impl ClipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipKind::Intro => "intro",
            ClipKind::Narration => "narration",
        }
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        match self {
            ClipKind::Intro => (1280, 720),
            ClipKind::Narration => (320, 180),
        }
    }
}

impl From<SegmentKind> for ClipKind {
    fn from(kind: SegmentKind) -> Self {
        match kind {
            SegmentKind::Intro => ClipKind::Intro,
            SegmentKind::Narration => ClipKind::Narration,
        }
    }
}

/// One script segment after rendering. `video_file` is `None` when the
/// render failed; composition simply skips those.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedClip {
    pub segment_id: u32,
    pub kind: ClipKind,
    pub start_time: f64,
    pub duration: f64,
    pub text: String,
    pub video_file: Option<PathBuf>,
}

/// Renders spoken text into an avatar video file.
pub trait AvatarRenderer {
    type Error: std::fmt::Debug;

    /// Renders `text` spoken by the avatar into `dest`.
    ///
    /// `Ok(None)` means the provider accepted the job but rendering failed
    /// or timed out; only client-side errors surface as `Err`.
    fn render_clip(
        &self,
        text: &str,
        kind: ClipKind,
        dest: &Path,
    ) -> impl Future<Output = Result<Option<PathBuf>, Self::Error>>;
}

/// Renders every segment of a script, intro first, sequentially.
///
/// Per-segment failures are logged and recorded as clips without a file;
/// one bad render never aborts the rest of the script.
#[tracing::instrument(skip_all, fields(course_title = %script.course_title))]
pub async fn render_script_segments<A: AvatarRenderer>(
    renderer: &A,
    script: &VideoScript,
    output_dir: &Path,
) -> Vec<RenderedClip> {
    let mut clips = Vec::new();

    match script.intro() {
        Some(intro) => {
            clips.push(render_one(renderer, intro, ClipKind::Intro, 0, output_dir).await);
        }
        None => tracing::warn!("Script has no intro segment"),
    }

    for (index, segment) in script.narrations().enumerate() {
        clips.push(render_one(renderer, segment, ClipKind::Narration, index + 1, output_dir).await);
    }

    let rendered = clips.iter().filter(|c| c.video_file.is_some()).count();
    tracing::info!(total = clips.len(), rendered, "Avatar segment rendering finished");
    clips
}

async fn render_one<A: AvatarRenderer>(
    renderer: &A,
    segment: &ScriptSegment,
    kind: ClipKind,
    index: usize,
    output_dir: &Path,
) -> RenderedClip {
    let dest = output_dir.join(format!("avatar_segment_{index}_{}.mp4", kind.as_str()));
    let video_file = match renderer.render_clip(&segment.narration_text, kind, &dest).await {
        Ok(file) => file,
        Err(err) => {
            tracing::warn!(
                error = ?err,
                segment_id = segment.segment_id,
                "Avatar render failed, skipping segment"
            );
            None
        }
    };

    RenderedClip {
        segment_id: segment.segment_id,
        kind,
        start_time: segment.start_time,
        duration: segment.duration,
        text: segment.narration_text.clone(),
        video_file,
    }
}
