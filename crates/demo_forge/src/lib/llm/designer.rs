use std::future::Future;

use crate::course::CourseCatalog;

/// Designs a learning path of tutorial courses from a product exploration.
pub trait CourseDesigner {
    const DESIGNER_MODEL: &str;

    type Error: std::fmt::Debug;

    /// Turns the raw exploration analysis into `count` courses that build on
    /// each other from beginner to advanced.
    fn design_courses(
        &self,
        analysis: &str,
        product_url: &str,
        count: usize,
    ) -> impl Future<Output = Result<CourseCatalog, Self::Error>>;
}
