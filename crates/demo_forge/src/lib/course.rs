//! Course catalog models.
//!
//! These types double as the JSON schema sent to OpenAI structured outputs,
//! which is why every field is required and unknown fields are rejected:
//! strict mode needs `additionalProperties: false` and a full `required`
//! list, both of which the derives produce from this shape.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One UI step of a course implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UiStep {
    /// 1-based position of the step within the course.
    pub step_number: u32,
    /// The concrete UI action to take.
    pub action: String,
    /// What the user should see once the action succeeds.
    pub expected_result: String,
    /// What the screen looks like at this point.
    pub screenshot_description: String,
}

/// A concept the course teaches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CourseConcept {
    pub concept_name: String,
    /// Plain-language explanation of the concept.
    pub explanation: String,
    /// Why the concept matters to the target user.
    pub why_important: String,
}

/// The hands-on part of a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CourseImplementation {
    /// Where in the product the course begins.
    pub starting_point: String,
    /// Ordered UI steps the learner follows.
    pub ui_steps: Vec<UiStep>,
    /// The end state that proves the course worked.
    pub expected_outcome: String,
    /// Mistakes users commonly make along the way.
    pub common_pitfalls: Vec<String>,
}

/// A single tutorial course designed from the product exploration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Course {
    pub title: String,
    /// The one idea the course exists to teach.
    pub key_idea: String,
    /// Who the course is for.
    pub target_user: String,
    /// beginner, intermediate or advanced.
    pub difficulty_level: String,
    pub estimated_time_minutes: u32,
    pub concepts: Vec<CourseConcept>,
    pub implementation: CourseImplementation,
    /// A realistic scenario where this skill pays off.
    pub real_world_use_case: String,
    /// Suggested follow-ups once the course is done.
    pub next_steps: Vec<String>,
}

/// The full set of courses designed for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CourseCatalog {
    pub product_name: String,
    pub product_category: String,
    /// How the courses build on each other.
    pub learning_path_overview: String,
    pub courses: Vec<Course>,
}

/// Product identity handed to the doc writer alongside each timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductContext {
    pub product_name: String,
    pub product_url: String,
    /// Leading slice of the raw exploration analysis.
    pub product_overview: String,
}
