use std::sync::{Arc, Mutex};

use demo_forge::{
    course::{CourseConcept, CourseImplementation, UiStep},
    Course, CourseCatalog, CourseDesigner, CourseTimeline, DocWriter, Narrator, ProductContext,
    ScriptSegment, SegmentKind, VerificationExtractor, VideoScript,
};

/// Extractor seam returning a fixed verification link (or none).
#[derive(Clone, Default)]
pub struct MockExtractor {
    pub link: Option<String>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockExtractor {
    pub fn with_link(link: &str) -> Self {
        Self {
            link: Some(link.to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl VerificationExtractor for MockExtractor {
    const EXTRACTOR_MODEL: &str = "mock-extractor";

    type Error = anyhow::Error;

    async fn extract_verification(&self, subject: &str, _body: &str) -> anyhow::Result<Option<String>> {
        self.calls.lock().unwrap().push(subject.to_owned());
        Ok(self.link.clone())
    }
}

pub fn sample_course(index: usize) -> Course {
    Course {
        title: format!("Course {}: Getting Things Done", index + 1),
        key_idea: "One feature, learned end to end".to_string(),
        target_user: "New users".to_string(),
        difficulty_level: "beginner".to_string(),
        estimated_time_minutes: 5,
        concepts: vec![CourseConcept {
            concept_name: "Workspaces".to_string(),
            explanation: "Everything lives in a workspace".to_string(),
            why_important: "It is the unit of sharing".to_string(),
        }],
        implementation: CourseImplementation {
            starting_point: "Dashboard home".to_string(),
            ui_steps: vec![UiStep {
                step_number: 1,
                action: "Click the New button".to_string(),
                expected_result: "A dialog opens".to_string(),
                screenshot_description: "The creation dialog".to_string(),
            }],
            expected_outcome: "One item created".to_string(),
            common_pitfalls: vec!["Skipping the confirmation".to_string()],
        },
        real_world_use_case: "Organizing client work".to_string(),
        next_steps: vec!["Share it with a teammate".to_string()],
    }
}

/// Designer seam returning a canned catalog.
#[derive(Clone)]
pub struct MockDesigner {
    pub catalog: CourseCatalog,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub fail_with: Option<String>,
}

impl MockDesigner {
    pub fn with_course_count(count: usize) -> Self {
        Self {
            catalog: CourseCatalog {
                product_name: "Notesy".to_string(),
                product_category: "Note taking".to_string(),
                learning_path_overview: "From first note to shared workspace".to_string(),
                courses: (0..count).map(sample_course).collect(),
            },
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::with_course_count(0)
        }
    }
}

impl CourseDesigner for MockDesigner {
    const DESIGNER_MODEL: &str = "mock-designer";

    type Error = anyhow::Error;

    async fn design_courses(
        &self,
        analysis: &str,
        _product_url: &str,
        _count: usize,
    ) -> anyhow::Result<CourseCatalog> {
        self.calls.lock().unwrap().push(analysis.to_owned());
        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        Ok(self.catalog.clone())
    }
}

/// Narrator + doc writer seam producing a two-segment script and a short
/// MDX document per course.
#[derive(Clone, Default)]
pub struct MockNarrator {
    pub script_calls: Arc<Mutex<Vec<String>>>,
    pub doc_calls: Arc<Mutex<Vec<String>>>,
    pub fail_scripts: bool,
}

impl MockNarrator {
    pub fn failing_scripts() -> Self {
        Self {
            fail_scripts: true,
            ..Self::default()
        }
    }
}

impl Narrator for MockNarrator {
    const NARRATOR_MODEL: &str = "mock-narrator";

    type Error = anyhow::Error;

    async fn write_script(
        &self,
        course_title: &str,
        _key_idea: &str,
        product_name: &str,
        timeline: &CourseTimeline,
    ) -> anyhow::Result<VideoScript> {
        self.script_calls.lock().unwrap().push(course_title.to_owned());
        if self.fail_scripts {
            return Err(anyhow::anyhow!("scripting unavailable"));
        }
        Ok(VideoScript {
            course_title: course_title.to_owned(),
            product_name: product_name.to_owned(),
            total_duration: timeline.duration_seconds,
            intro_duration: 10.0,
            segments: vec![
                ScriptSegment {
                    segment_id: 0,
                    segment_type: SegmentKind::Intro,
                    start_time: 0.0,
                    duration: 10.0,
                    narration_text: format!("Welcome to {course_title}."),
                    context: "Title card".to_string(),
                },
                ScriptSegment {
                    segment_id: 1,
                    segment_type: SegmentKind::Narration,
                    start_time: 5.0,
                    duration: 8.0,
                    narration_text: "Now I'm clicking the New button.".to_string(),
                    context: "The creation dialog opens".to_string(),
                },
            ],
        })
    }
}

impl DocWriter for MockNarrator {
    const DOC_MODEL: &str = "mock-doc-writer";

    type Error = anyhow::Error;

    async fn write_course_doc(
        &self,
        course: &Course,
        _timeline: &CourseTimeline,
        product: &ProductContext,
    ) -> anyhow::Result<String> {
        self.doc_calls.lock().unwrap().push(course.title.clone());
        Ok(format!(
            "# {}\n\nA tutorial for {}.\n",
            course.title, product.product_name
        ))
    }
}
