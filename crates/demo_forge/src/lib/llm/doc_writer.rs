use std::future::Future;

use crate::{
    course::{Course, ProductContext},
    timeline::CourseTimeline,
};

/// Writes the MDX course document for one executed course.
pub trait DocWriter {
    const DOC_MODEL: &str;

    /// Token budget for the prompt, leaving headroom for the completion.
    const CONTEXT_WINDOW_LIMIT: usize = 200_000 - 16_000;

    type Error: std::fmt::Debug;

    /// Returns ready-to-save MDX built from what actually happened during
    /// execution, not from the course plan alone.
    fn write_course_doc(
        &self,
        course: &Course,
        timeline: &CourseTimeline,
        product: &ProductContext,
    ) -> impl Future<Output = Result<String, Self::Error>>;
}
