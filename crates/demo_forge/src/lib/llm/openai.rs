//! OpenAI chat-completions client.
//!
//! One client implements all four LLM seams. Catalogs and scripts are
//! requested through structured outputs in strict mode, with the JSON schema
//! derived straight from the target types.

use std::fmt::Write as _;

use reqwest_middleware::ClientWithMiddleware;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize};

use super::{clamp_to_context, strip_code_fences, CourseDesigner, DocWriter, Narrator, VerificationExtractor};
use crate::{
    course::{Course, CourseCatalog, ProductContext},
    http::retrying_client,
    script::VideoScript,
    timeline::{truncate_chars, CourseTimeline},
};

const EXTRACTOR_SYSTEM_PROMPT: &str = include_str!("./prompts/system_extractor.txt");
const DESIGNER_SYSTEM_PROMPT: &str = include_str!("./prompts/system_designer.txt");
const NARRATOR_SYSTEM_PROMPT: &str = include_str!("./prompts/system_narrator.txt");
const DOC_WRITER_SYSTEM_PROMPT: &str = include_str!("./prompts/system_doc_writer.txt");

/// Verification emails can drag in huge HTML bodies; this keeps the
/// extraction prompt bounded.
const EMAIL_BODY_MAX_CHARS: usize = 16_000;

const NARRATION_TIMELINE_MAX_CHARS: usize = 4_000;
const DOC_TIMELINE_MAX_CHARS: usize = 8_000;
const DOC_OVERVIEW_MAX_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum OpenAIError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest_middleware::Error),

    #[error("Invalid response: {0}")]
    Response(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Model refused the request: {0}")]
    Refusal(String),

    #[error("Empty completion: {0}")]
    EmptyCompletion(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Knobs that vary between models. The o3 reasoning models reject
/// `temperature` and want `max_completion_tokens` instead of `max_tokens`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompletionParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_completion_tokens: Option<u32>,
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    pub const BASE_URL: &str = "https://api.openai.com/v1";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: retrying_client(),
            api_key: api_key.into(),
            base_url: Self::BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Plain chat completion, returning the assistant's text.
    pub async fn send_completion_request(
        &self,
        model: &str,
        system_prompt: &str,
        user_content: &str,
        params: CompletionParams,
    ) -> Result<String, OpenAIError> {
        let mut body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_content },
            ],
        });
        apply_params(&mut body, params);

        self.post_chat(&body).await?.into_content()
    }

    /// Structured-output completion deserialized into `T`.
    ///
    /// `T`'s schema is sent in strict mode, so the model must answer with
    /// exactly that shape or refuse.
    pub async fn send_structured_request<T>(
        &self,
        model: &str,
        schema_name: &str,
        system_prompt: &str,
        user_content: &str,
        params: CompletionParams,
    ) -> Result<T, OpenAIError>
    where
        T: JsonSchema + DeserializeOwned,
    {
        let schema = schemars::schema_for!(T);
        let mut body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_content },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": schema_name,
                    "strict": true,
                    "schema": schema,
                },
            },
        });
        apply_params(&mut body, params);

        let content = self.post_chat(&body).await?.into_content()?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn post_chat(&self, body: &serde_json::Value) -> Result<CompletionResponse, OpenAIError> {
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await?;
            return Err(OpenAIError::Api { status, message });
        }

        Ok(resp.json::<CompletionResponse>().await?)
    }
}

fn apply_params(body: &mut serde_json::Value, params: CompletionParams) {
    if let Some(temperature) = params.temperature {
        body["temperature"] = temperature.into();
    }
    if let Some(max_tokens) = params.max_tokens {
        body["max_tokens"] = max_tokens.into();
    }
    if let Some(max_completion_tokens) = params.max_completion_tokens {
        body["max_completion_tokens"] = max_completion_tokens.into();
    }
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    pub message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
pub struct CompletionMessage {
    pub content: Option<String>,
    pub refusal: Option<String>,
}

impl CompletionResponse {
    fn into_content(self) -> Result<String, OpenAIError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or(OpenAIError::EmptyCompletion("no choices"))?;
        if let Some(refusal) = choice.message.refusal {
            return Err(OpenAIError::Refusal(refusal));
        }
        choice
            .message
            .content
            .ok_or(OpenAIError::EmptyCompletion("no content"))
    }
}

impl VerificationExtractor for OpenAIClient {
    const EXTRACTOR_MODEL: &str = "gpt-4o";

    type Error = OpenAIError;

    #[tracing::instrument(skip_all)]
    async fn extract_verification(
        &self,
        subject: &str,
        body: &str,
    ) -> Result<Option<String>, OpenAIError> {
        let user_content = format!(
            "Email subject: {subject}\n\nEmail body:\n{}",
            truncate_chars(body, EMAIL_BODY_MAX_CHARS)
        );
        let answer = self
            .send_completion_request(
                Self::EXTRACTOR_MODEL,
                EXTRACTOR_SYSTEM_PROMPT,
                &user_content,
                CompletionParams {
                    temperature: Some(0.0),
                    max_tokens: Some(16_000),
                    ..Default::default()
                },
            )
            .await?;

        let answer = answer.trim();
        if answer.eq_ignore_ascii_case("NONE") || !answer.starts_with("http") {
            return Ok(None);
        }
        Ok(Some(answer.to_string()))
    }
}

impl CourseDesigner for OpenAIClient {
    const DESIGNER_MODEL: &str = "o3-mini";

    type Error = OpenAIError;

    #[tracing::instrument(skip_all)]
    async fn design_courses(
        &self,
        analysis: &str,
        product_url: &str,
        count: usize,
    ) -> Result<CourseCatalog, OpenAIError> {
        let catalog: CourseCatalog = self
            .send_structured_request(
                Self::DESIGNER_MODEL,
                "course_catalog",
                DESIGNER_SYSTEM_PROMPT,
                &design_prompt(analysis, product_url, count),
                CompletionParams {
                    max_completion_tokens: Some(16_000),
                    ..Default::default()
                },
            )
            .await?;
        tracing::info!(courses = catalog.courses.len(), "Designed course catalog");
        Ok(catalog)
    }
}

impl Narrator for OpenAIClient {
    const NARRATOR_MODEL: &str = "o3-mini";

    type Error = OpenAIError;

    #[tracing::instrument(skip_all)]
    async fn write_script(
        &self,
        course_title: &str,
        key_idea: &str,
        product_name: &str,
        timeline: &CourseTimeline,
    ) -> Result<VideoScript, OpenAIError> {
        let user_content = clamp_to_context(
            narration_prompt(course_title, key_idea, product_name, timeline),
            <Self as Narrator>::CONTEXT_WINDOW_LIMIT,
        );
        self.send_structured_request(
            Self::NARRATOR_MODEL,
            "video_script",
            NARRATOR_SYSTEM_PROMPT,
            &user_content,
            CompletionParams {
                max_completion_tokens: Some(8_000),
                ..Default::default()
            },
        )
        .await
    }
}

impl DocWriter for OpenAIClient {
    const DOC_MODEL: &str = "o3-mini";

    type Error = OpenAIError;

    #[tracing::instrument(skip_all)]
    async fn write_course_doc(
        &self,
        course: &Course,
        timeline: &CourseTimeline,
        product: &ProductContext,
    ) -> Result<String, OpenAIError> {
        let user_content = clamp_to_context(
            doc_prompt(course, timeline, product),
            <Self as DocWriter>::CONTEXT_WINDOW_LIMIT,
        );
        let content = self
            .send_completion_request(
                Self::DOC_MODEL,
                DOC_WRITER_SYSTEM_PROMPT,
                &user_content,
                CompletionParams {
                    max_completion_tokens: Some(16_000),
                    ..Default::default()
                },
            )
            .await?;
        Ok(strip_code_fences(&content))
    }
}

fn design_prompt(analysis: &str, product_url: &str, count: usize) -> String {
    format!(
        r#"Based on the following product exploration, create {count} educational demos/courses that will help users learn to use this product effectively.

PRODUCT URL: {product_url}

EXPLORATION RESULTS:
{analysis}

REQUIREMENTS:

1. Create {count} demos that build on each other (beginner -> advanced)
2. Each demo should be REALISTIC and PRACTICAL - something users would actually do
3. Use SPECIFIC UI INSTRUCTIONS from the exploration (exact button names, page locations, etc.)
4. Make demos ACTIONABLE - someone should be able to follow step-by-step
5. Focus on teaching CONCEPTS, not just clicking buttons
6. Include realistic use cases and examples

DEMO GUIDELINES:

- **Beginner demos**: Start with essential workflows, core features
- **Intermediate demos**: Combine features, more complex workflows
- **Advanced demos**: Power user features, integrations, optimization

For each demo:
- Use actual UI elements mentioned in the exploration
- Reference specific pages, buttons, menus from the analysis
- Create realistic scenarios (e.g., "Build a project tracker" not just "Create a project")
- Explain WHY each step matters
- Include common pitfalls users might encounter

ENSURE DIVERSITY:
- Cover different aspects of the product
- Target different user personas (beginners, developers, teams, etc.)
- Show different use cases and workflows
- Progress from simple to complex

Generate a comprehensive learning path with {count} well-structured educational demos.
"#
    )
}

fn narration_prompt(
    course_title: &str,
    key_idea: &str,
    product_name: &str,
    timeline: &CourseTimeline,
) -> String {
    let summary: Vec<serde_json::Value> = timeline
        .events
        .iter()
        .map(|event| {
            serde_json::json!({
                "time": event.t_formatted,
                "time_seconds": event.t_offset_s,
                "url": event.url.as_deref().unwrap_or(""),
                "memory": truncate_chars(event.memory.as_deref().unwrap_or(""), 200),
                "actions": event.actions.len(),
            })
        })
        .collect();
    let summary_json = serde_json::to_string_pretty(&summary).unwrap_or_default();

    format!(
        r#"Create a narration script for a tutorial video about {product_name}.

COURSE INFORMATION:
Title: {course_title}
Product: {product_name}
Total Duration: {total_duration:.0} seconds
Key Idea: {key_idea}

TIMELINE EVENTS:
{timeline_events}

REQUIREMENTS:

1. INTRO SEGMENT (0):
   - segment_type: "intro"
   - start_time: 0
   - duration: 10-15 seconds
   - Create a welcoming introduction that:
     * Greets the viewer
     * States what this tutorial will teach
     * Mentions the product name
     * Sets expectations (brief and encouraging)
   - Keep it concise and friendly!

2. NARRATION SEGMENTS (1+):
   - segment_type: "narration"
   - Create 5-8 segments covering the main parts of the tutorial
   - Each segment should:
     * start_time: Match timeline events (use t_offset_s from events)
     * duration: 5-15 seconds (brief narration)
     * narration_text: What to say (as if you're demonstrating)
     * context: What's happening in the browser
   - Narration should be:
     * Concise (1-2 sentences per segment)
     * Action-oriented ("Now I'm clicking...", "Here we're entering...")
     * Natural and conversational
     * First-person ("I'm", "we're", "let's")

3. TIMING:
   - Intro at time 0
   - Narration segments aligned with key timeline moments
   - Don't narrate EVERY step - pick 5-8 key moments
   - Each narration: 5-15 seconds max

4. STYLE:
   - Friendly, professional tone
   - Speak as the demonstrator
   - Keep it simple and clear
   - Avoid jargon

Generate a complete video script with intro + narration segments.
"#,
        total_duration = timeline.duration_seconds,
        timeline_events = truncate_chars(&summary_json, NARRATION_TIMELINE_MAX_CHARS),
    )
}

fn doc_prompt(course: &Course, timeline: &CourseTimeline, product: &ProductContext) -> String {
    let summary: Vec<serde_json::Value> = timeline
        .events
        .iter()
        .map(|event| {
            serde_json::json!({
                "step": event.step_number,
                "time": event.t_formatted,
                "url": event.url.as_deref().unwrap_or(""),
                "memory": event.memory.as_deref().unwrap_or(""),
                "actions": event.actions,
                "screenshot": event.screenshot_url.as_deref().unwrap_or(""),
            })
        })
        .collect();
    let summary_json = serde_json::to_string_pretty(&summary).unwrap_or_default();

    let mut prompt = String::new();
    let _ = write!(
        prompt,
        r#"Create a clean, beautiful MDX course file for this tutorial.

PRODUCT CONTEXT:
{product_name}
{product_overview}

COURSE INFORMATION:
Title: {title}
Target Audience: {target_user}
Difficulty: {difficulty}
Estimated Time: {estimated_time} minutes
Key Learning Objective: {key_idea}
Real-World Use Case: {use_case}

EXECUTION TIMELINE (What Actually Happened):
Total Steps: {total_steps}
Recording URL: {recording_url}

Timeline Events:
{timeline_events}

REQUIREMENTS:

1. OUTPUT FORMAT:
   - Valid MDX (markdown with JSX)
   - Clean, professional formatting
   - User-friendly language (not technical jargon)
   - Simple and clear explanations

2. STRUCTURE:
   - Course title and metadata
   - Introduction with use case
   - Step-by-step walkthrough
   - Each step should have:
     * Clear heading with timestamp
     * What to do (simple instructions)
     * Screenshot image (use actual screenshot URLs from timeline)
     * Why this step matters (brief explanation)
   - Conclusion with next steps

3. CONTENT GUIDELINES:
   - Write for the TARGET AUDIENCE ({target_user})
   - Keep it SIMPLE - avoid complexity
   - Use ACTUAL screenshots from the timeline
   - Reference EXACT URLs and actions from the execution
   - Make it ACTIONABLE - users should be able to follow along
   - Show the CONTEXT - explain how steps connect
   - Be ENCOURAGING - positive, supportive tone

4. SCREENSHOTS:
   - Use the actual screenshot URLs from the timeline
   - Format as: ![Step description](screenshot_url)
   - Include for EVERY major step
   - Add descriptive alt text

5. STYLE:
   - Friendly, conversational tone
   - Short paragraphs (2-3 sentences)
   - Bullet points for lists
   - Headers for sections
   - Emphasis for important points

6. MDX COMPONENTS (optional):
   - <Callout> for important notes
   - <Steps> for numbered sequences
   - <Card> for tips/warnings

IMPORTANT:
- Base the walkthrough on the ACTUAL execution timeline
- Use the agent's "memory" field to understand what happened
- Reference the screenshots that were captured
- Make it flow logically from step to step
- Keep it concise but complete
- The agent may or may not have gotten sidetracked or had to do other clicks. Understand exactly what the course is trying to show and present the ideal flow, skipping errors or going off track.

Generate a beautiful, clean MDX file that teaches users how to complete this course.
Output ONLY the MDX content, nothing else. Do NOT wrap it in code blocks or add any preamble.
Start directly with the MDX frontmatter or title.
"#,
        product_name = product.product_name,
        product_overview = truncate_chars(&product.product_overview, DOC_OVERVIEW_MAX_CHARS),
        title = course.title,
        target_user = course.target_user,
        difficulty = course.difficulty_level,
        estimated_time = course.estimated_time_minutes,
        key_idea = course.key_idea,
        use_case = course.real_world_use_case,
        total_steps = timeline.events.len(),
        recording_url = timeline.recording_url.as_deref().unwrap_or(""),
        timeline_events = truncate_chars(&summary_json, DOC_TIMELINE_MAX_CHARS),
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::TimelineEvent;

    fn sample_timeline() -> CourseTimeline {
        CourseTimeline {
            course_index: 0,
            course_title: "Getting Started".into(),
            session_id: "sess-1".into(),
            task_id: "task-1".into(),
            recording_url: Some("https://share.test/r/1".into()),
            duration_seconds: 95.0,
            total_steps: 1,
            events: vec![TimelineEvent {
                step_number: 1,
                t_offset_s: 4.2,
                t_formatted: "00:04".into(),
                url: Some("https://app.test/home".into()),
                screenshot_url: Some("https://cdn.test/s1.png".into()),
                memory: Some("Opened the dashboard".into()),
                next_goal: None,
                evaluation_previous_goal: None,
                actions: vec![r#"{"click": {"index": 3}}"#.into()],
                timestamp: chrono::Utc::now(),
            }],
        }
    }

    #[test]
    fn design_prompt_embeds_the_analysis_and_count() {
        let prompt = design_prompt("RAW ANALYSIS HERE", "https://app.test", 5);
        assert!(prompt.contains("create 5 educational demos/courses"));
        assert!(prompt.contains("PRODUCT URL: https://app.test"));
        assert!(prompt.contains("RAW ANALYSIS HERE"));
    }

    #[test]
    fn narration_prompt_summarizes_the_timeline() {
        let prompt = narration_prompt("Getting Started", "Learn the basics", "Notesy", &sample_timeline());
        assert!(prompt.contains("Total Duration: 95 seconds"));
        assert!(prompt.contains("\"time_seconds\": 4.2"));
        assert!(prompt.contains("Key Idea: Learn the basics"));
        // narration summaries carry action counts, not payloads
        assert!(prompt.contains("\"actions\": 1"));
        assert!(!prompt.contains("\"click\""));
    }

    #[test]
    fn doc_prompt_keeps_screenshots_and_full_actions() {
        let course = Course {
            title: "Getting Started".into(),
            key_idea: "Learn the basics".into(),
            target_user: "new users".into(),
            difficulty_level: "beginner".into(),
            estimated_time_minutes: 10,
            concepts: vec![],
            implementation: crate::course::CourseImplementation {
                starting_point: "Home".into(),
                ui_steps: vec![],
                expected_outcome: "Done".into(),
                common_pitfalls: vec![],
            },
            real_world_use_case: "Taking notes".into(),
            next_steps: vec![],
        };
        let product = ProductContext {
            product_name: "Notesy".into(),
            product_url: "https://app.test".into(),
            product_overview: "A notes app.".into(),
        };
        let prompt = doc_prompt(&course, &sample_timeline(), &product);
        assert!(prompt.contains("https://cdn.test/s1.png"));
        assert!(prompt.contains("Recording URL: https://share.test/r/1"));
        assert!(prompt.contains("Target Audience: new users"));
    }
}
