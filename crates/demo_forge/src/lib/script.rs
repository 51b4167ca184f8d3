//! Narration script models, shared between the script writer and the video
//! composer. Like the course catalog these derive `JsonSchema` so they can
//! be requested verbatim via structured outputs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fallback intro length when a script does not carry one.
pub const DEFAULT_INTRO_DURATION: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    /// Full-screen opening segment played before the demo recording.
    Intro,
    /// Picture-in-picture commentary overlaid on the recording.
    Narration,
}

/// One narration segment of a tutorial video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ScriptSegment {
    /// 0-based id; the intro is always segment 0.
    pub segment_id: u32,
    pub segment_type: SegmentKind,
    /// Offset into the demo recording, in seconds. 0 for the intro.
    pub start_time: f64,
    /// How long the narration runs, in seconds.
    pub duration: f64,
    /// The words the avatar speaks.
    pub narration_text: String,
    /// What is happening on screen while this plays.
    pub context: String,
}

/// A complete narration script for one executed course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct VideoScript {
    pub course_title: String,
    pub product_name: String,
    /// Duration of the demo recording the script was written against.
    pub total_duration: f64,
    /// Length of the intro segment, in seconds.
    pub intro_duration: f64,
    pub segments: Vec<ScriptSegment>,
}

impl VideoScript {
    pub fn intro(&self) -> Option<&ScriptSegment> {
        self.segments
            .iter()
            .find(|s| s.segment_type == SegmentKind::Intro)
    }

    pub fn narrations(&self) -> impl Iterator<Item = &ScriptSegment> {
        self.segments
            .iter()
            .filter(|s| s.segment_type == SegmentKind::Narration)
    }

    /// Intro length to use for composition, defaulting when the script's own
    /// value is missing or nonsensical.
    pub fn effective_intro_duration(&self) -> f64 {
        if self.intro_duration > 0.0 {
            self.intro_duration
        } else {
            DEFAULT_INTRO_DURATION
        }
    }
}
