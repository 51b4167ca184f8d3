use std::future::Future;

use crate::{script::VideoScript, timeline::CourseTimeline};

/// Writes the narration script for one executed course.
pub trait Narrator {
    const NARRATOR_MODEL: &str;

    /// Token budget for the prompt, leaving headroom for the completion.
    const CONTEXT_WINDOW_LIMIT: usize = 200_000 - 16_000;

    type Error: std::fmt::Debug;

    /// Produces an intro plus timed narration segments aligned with the
    /// timeline's step offsets.
    fn write_script(
        &self,
        course_title: &str,
        key_idea: &str,
        product_name: &str,
        timeline: &CourseTimeline,
    ) -> impl Future<Output = Result<VideoScript, Self::Error>>;
}
