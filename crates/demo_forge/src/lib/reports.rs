//! Artifact writing.
//!
//! Every stage leaves files in the output directory: exploration JSON plus
//! a readable report, the course catalog, per-course timelines and
//! walkthroughs, narration scripts and final MDX docs. File names carry the
//! product domain and a local timestamp so consecutive runs never clobber
//! each other.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use anyhow::Context;
use regex::Regex;
use serde::Serialize;

use crate::{
    course::CourseCatalog,
    executor::CourseOutcome,
    exploration::ExplorationReport,
    mail::Credentials,
    script::VideoScript,
    timeline::{describe_action_or_raw, truncate_chars, CourseTimeline, TimelineEvent},
};

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("Invalid slug regex"));

const BAR: &str =
    "================================================================================";

/// Host part of a URL, or the raw input when it does not parse.
pub(crate) fn site_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}

/// Host with the dots flattened, for file names.
fn domain_slug(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|host| host.replace('.', "_")))
        .unwrap_or_else(|| "unknown".to_owned())
}

fn file_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// File-safe slug of a course title, at most 50 characters.
pub fn title_slug(title: &str) -> String {
    let lowered = title.to_lowercase();
    let dashed = SLUG_RE.replace_all(&lowered, "-");
    let mut slug = dashed.trim_matches('-').to_owned();
    slug.truncate(50);
    slug.trim_end_matches('-').to_owned()
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let contents = serde_json::to_vec_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

async fn write_text(path: &Path, contents: String) -> anyhow::Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[derive(Debug, Clone)]
pub struct ExplorationArtifacts {
    pub json: PathBuf,
    pub report: PathBuf,
}

#[tracing::instrument(skip_all)]
pub async fn write_exploration_report(
    output_dir: &Path,
    report: &ExplorationReport,
) -> anyhow::Result<ExplorationArtifacts> {
    let stem = format!(
        "exploration_{}_{}",
        domain_slug(&report.product_url),
        file_timestamp()
    );
    let json = output_dir.join(format!("{stem}.json"));
    let txt = output_dir.join(format!("{stem}_REPORT.txt"));

    write_json(&json, report).await?;
    write_text(&txt, render_exploration_report(report)).await?;

    tracing::info!(
        json = %json.display(),
        report = %txt.display(),
        "Exploration artifacts written"
    );
    Ok(ExplorationArtifacts { json, report: txt })
}

#[derive(Debug, Clone)]
pub struct CatalogArtifacts {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

#[tracing::instrument(skip_all)]
pub async fn write_course_catalog(
    output_dir: &Path,
    catalog: &CourseCatalog,
    report: &ExplorationReport,
) -> anyhow::Result<CatalogArtifacts> {
    let stem = format!(
        "courses_{}_{}",
        domain_slug(&report.product_url),
        file_timestamp()
    );
    let json = output_dir.join(format!("{stem}.json"));
    let markdown = output_dir.join(format!("{stem}_COURSES.md"));

    write_json(&json, catalog).await?;
    write_text(&markdown, render_catalog_markdown(catalog, report)).await?;

    tracing::info!(
        json = %json.display(),
        markdown = %markdown.display(),
        "Course catalog written"
    );
    Ok(CatalogArtifacts { json, markdown })
}

#[derive(Debug, Clone)]
pub struct ExecutionArtifacts {
    pub json: PathBuf,
    pub report: PathBuf,
    pub timelines: Vec<PathBuf>,
}

#[derive(Serialize)]
struct ExecutionSummaryFile<'a> {
    timestamp: &'a str,
    product_url: &'a str,
    product_name: &'a str,
    total_courses: usize,
    executions: &'a [CourseOutcome],
}

#[tracing::instrument(skip_all)]
pub async fn write_execution_artifacts(
    output_dir: &Path,
    outcomes: &[CourseOutcome],
    catalog: &CourseCatalog,
    product_url: &str,
) -> anyhow::Result<ExecutionArtifacts> {
    let timestamp = file_timestamp();
    let mut timelines = Vec::new();

    for outcome in outcomes {
        let Some(timeline) = outcome.timeline_data() else {
            continue;
        };
        let stem = format!("course_{}_{}", outcome.course_index + 1, timeline.session_id);

        let timeline_path = output_dir.join(format!("{stem}_timeline.json"));
        write_json(&timeline_path, &timeline).await?;

        let walkthrough_path = output_dir.join(format!("{stem}_SCRIPT.md"));
        write_text(
            &walkthrough_path,
            render_walkthrough(&timeline, outcome.credentials.as_ref()),
        )
        .await?;

        timelines.push(timeline_path);
    }

    let stem = format!(
        "course_executions_{}_{}",
        domain_slug(product_url),
        timestamp
    );
    let json = output_dir.join(format!("{stem}.json"));
    write_json(
        &json,
        &ExecutionSummaryFile {
            timestamp: &timestamp,
            product_url,
            product_name: &catalog.product_name,
            total_courses: outcomes.len(),
            executions: outcomes,
        },
    )
    .await?;

    let report = output_dir.join(format!("{stem}_REPORT.md"));
    write_text(
        &report,
        render_execution_report(outcomes, catalog, product_url, &timestamp),
    )
    .await?;

    tracing::info!(
        executions = %json.display(),
        report = %report.display(),
        timelines = timelines.len(),
        "Execution artifacts written"
    );
    Ok(ExecutionArtifacts {
        json,
        report,
        timelines,
    })
}

pub async fn write_script_json(
    output_dir: &Path,
    course_index: usize,
    session_id: &str,
    script: &VideoScript,
) -> anyhow::Result<PathBuf> {
    let path = output_dir.join(format!(
        "course_{}_{}_script.json",
        course_index + 1,
        session_id
    ));
    write_json(&path, script).await?;
    tracing::info!(file = %path.display(), "Narration script written");
    Ok(path)
}

pub async fn write_mdx(
    output_dir: &Path,
    course_index: usize,
    course_title: &str,
    mdx: &str,
) -> anyhow::Result<PathBuf> {
    let path = output_dir.join(format!(
        "course_{}_{}.mdx",
        course_index + 1,
        title_slug(course_title)
    ));
    write_text(&path, mdx.to_owned()).await?;
    tracing::info!(file = %path.display(), "Course doc written");
    Ok(path)
}

fn render_exploration_report(report: &ExplorationReport) -> String {
    let mut out = String::new();
    out.push_str(BAR);
    out.push_str("\nPRODUCT EXPLORATION REPORT\n");
    out.push_str(BAR);
    out.push_str("\n\n");
    out.push_str(&format!("Product URL: {}\n", report.product_url));
    out.push_str(&format!("Explored on: {}\n", report.explored_at.to_rfc3339()));
    out.push_str(&format!("Duration: {:.1} seconds\n", report.duration_seconds));
    out.push_str(&format!("Status: {}\n\n", report.status));

    if let Some(share_url) = &report.share_url {
        out.push_str(&format!("Recording: {share_url}\n\n"));
    }

    out.push_str("Test Account:\n");
    out.push_str(&format!("  Email: {}\n", report.credentials.email));
    out.push_str(&format!("  Password: {}\n\n", report.credentials.password));

    out.push_str(BAR);
    out.push_str("\nANALYSIS\n");
    out.push_str(BAR);
    out.push_str("\n\n");
    out.push_str(&report.analysis.raw_output);
    out
}

fn render_catalog_markdown(catalog: &CourseCatalog, report: &ExplorationReport) -> String {
    let mut out = String::new();
    out.push_str("# Educational Demos & Courses\n\n");
    out.push_str(&format!("**Product:** {}\n", catalog.product_name));
    out.push_str(&format!("**Category:** {}\n", catalog.product_category));
    out.push_str(&format!("**URL:** {}\n", report.product_url));
    out.push_str(&format!(
        "**Generated:** {}\n\n",
        report.explored_at.to_rfc3339()
    ));

    out.push_str("---\n\n## Learning Path Overview\n\n");
    out.push_str(&format!("{}\n\n", catalog.learning_path_overview));
    out.push_str("---\n\n");
    out.push_str(&format!("## Courses ({} Total)\n\n", catalog.courses.len()));

    for (i, course) in catalog.courses.iter().enumerate() {
        out.push_str(&format!("### Course {}: {}\n\n", i + 1, course.title));
        out.push_str(&format!("**Target Audience:** {}\n", course.target_user));
        out.push_str(&format!(
            "**Difficulty:** {}\n",
            capitalize(&course.difficulty_level)
        ));
        out.push_str(&format!(
            "**Estimated Time:** {} minutes\n\n",
            course.estimated_time_minutes
        ));

        out.push_str("#### Key Learning Objective\n\n");
        out.push_str(&format!("{}\n\n", course.key_idea));
        out.push_str("#### Real-World Scenario\n\n");
        out.push_str(&format!("{}\n\n", course.real_world_use_case));

        if !course.concepts.is_empty() {
            out.push_str("#### Key Concepts\n\n");
            for (j, concept) in course.concepts.iter().enumerate() {
                out.push_str(&format!("{}. **{}**\n", j + 1, concept.concept_name));
                out.push_str(&format!("   - {}\n", concept.explanation));
                out.push_str(&format!("   - *Why it matters:* {}\n\n", concept.why_important));
            }
        }

        out.push_str("#### Step-by-Step Implementation\n\n");
        out.push_str(&format!(
            "**Starting Point:** {}\n\n",
            course.implementation.starting_point
        ));
        for step in &course.implementation.ui_steps {
            out.push_str(&format!("{}. **{}**\n", step.step_number, step.action));
            out.push_str(&format!("   - Expected result: {}\n", step.expected_result));
            out.push_str(&format!("   - Screen: {}\n\n", step.screenshot_description));
        }

        out.push_str("**Expected Outcome**\n\n");
        out.push_str(&format!("{}\n\n", course.implementation.expected_outcome));

        if !course.implementation.common_pitfalls.is_empty() {
            out.push_str("**Common Pitfalls to Avoid**\n\n");
            for pitfall in &course.implementation.common_pitfalls {
                out.push_str(&format!("- {pitfall}\n"));
            }
            out.push('\n');
        }

        if !course.next_steps.is_empty() {
            out.push_str("#### Next Steps\n\n");
            out.push_str("After completing this demo, you should:\n\n");
            for next_step in &course.next_steps {
                out.push_str(&format!("- {next_step}\n"));
            }
        }
        out.push_str("\n---\n\n");
    }

    out.push_str("## Additional Resources\n\n");
    out.push_str(&format!("- **Test Account:** {}\n", report.credentials.email));
    out.push_str(&format!("- **Password:** {}\n", report.credentials.password));
    if let Some(share_url) = &report.share_url {
        out.push_str(&format!("- **Exploration Recording:** {share_url}\n"));
    }
    out
}

/// The human-readable walkthrough of one executed course, with the agent's
/// reasoning and decoded actions per step.
fn render_walkthrough(timeline: &CourseTimeline, credentials: Option<&Credentials>) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", timeline.course_title));
    if let Some(url) = &timeline.recording_url {
        out.push_str(&format!("**Recording:** [{url}]({url})\n\n"));
    }
    out.push_str(&format!(
        "**Duration:** {:.1} seconds\n\n",
        timeline.duration_seconds
    ));
    out.push_str(&format!("**Total Steps:** {}\n\n", timeline.total_steps));
    if let Some(credentials) = credentials {
        out.push_str("**Test Credentials:**\n");
        out.push_str(&format!("- Email: `{}`\n", credentials.email));
        out.push_str(&format!("- Password: `{}`\n\n", credentials.password));
    }

    out.push_str("---\n\n## Detailed Execution Timeline\n\n");
    out.push_str(
        "*This shows exactly what the agent did, including its reasoning at each step.*\n\n",
    );

    for event in &timeline.events {
        out.push_str(&format!(
            "### [{}] Step {}\n\n",
            event.t_formatted, event.step_number
        ));

        if let Some(url) = event.url.as_deref().filter(|u| !u.is_empty()) {
            match url::Url::parse(url) {
                Ok(parsed) => {
                    let path = parsed.path();
                    let path = if path.is_empty() { "/" } else { path };
                    out.push_str(&format!("**URL:** `{path}`\n\n"));
                    if let Some(query) = parsed.query() {
                        out.push_str(&format!(
                            "*Query params: {}...*\n\n",
                            truncate_chars(query, 60)
                        ));
                    }
                }
                Err(_) => out.push_str(&format!("**URL:** `{url}`\n\n")),
            }
        }

        if let Some(shot) = event.screenshot_url.as_deref().filter(|s| !s.is_empty()) {
            out.push_str(&format!("**[Screenshot]({shot})**\n\n"));
        }

        if let Some(memory) = event.memory.as_deref().filter(|m| !m.is_empty()) {
            out.push_str("**Agent's Plan & Reasoning:**\n\n");
            out.push_str(memory);
            out.push_str("\n\n");
        }

        if !event.actions.is_empty() {
            out.push_str("**Actions Executed:**\n\n");
            for action in &event.actions {
                out.push_str(&format!("- {}\n", describe_action_or_raw(action)));
            }
            out.push('\n');
        }

        out.push_str("---\n\n");
    }

    out.push_str("## Summary\n\n");
    out.push_str(&format!(
        "This course execution took **{:.1} seconds** and completed **{} steps**.\n",
        timeline.duration_seconds, timeline.total_steps
    ));
    if let Some(url) = &timeline.recording_url {
        out.push_str(&format!("\nWatch the full recording at: {url}\n"));
    }
    out
}

fn render_execution_report(
    outcomes: &[CourseOutcome],
    catalog: &CourseCatalog,
    product_url: &str,
    timestamp: &str,
) -> String {
    let mut out = String::new();
    out.push_str("# Course Execution Report\n\n");
    out.push_str(&format!("**Product:** {}\n", catalog.product_name));
    out.push_str(&format!("**URL:** {product_url}\n"));
    out.push_str(&format!("**Executed:** {timestamp}\n\n"));
    out.push_str("---\n\n## Execution Results\n\n");

    for outcome in outcomes {
        out.push_str(&format!("### {}\n\n", outcome.course_title));
        out.push_str(&format!("- **Status:** {}\n", outcome.status));
        out.push_str(&format!(
            "- **Duration:** {:.1}s\n",
            outcome.duration_seconds
        ));
        out.push_str(&format!("- **Steps Captured:** {}\n", outcome.total_steps));

        if let Some(error) = &outcome.error {
            out.push_str(&format!("- **Error:** {error}\n"));
        }
        if let Some(credentials) = &outcome.credentials {
            out.push_str(&format!("- **Email:** {}\n", credentials.email));
            out.push_str(&format!("- **Password:** {}\n", credentials.password));
        }
        if let Some(share_url) = &outcome.share_url {
            out.push_str(&format!("- **Share URL:** {share_url}\n"));
        }
        if let Some(video) = &outcome.video_file {
            let name = video
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| video.display().to_string());
            out.push_str(&format!("- **Live Video:** `{name}`\n"));
        }

        if !outcome.timeline.is_empty() {
            out.push_str("\n**Timeline Preview (with Agent Plan):**\n\n");
            for row in preview_rows(&outcome.timeline) {
                match row {
                    Some(event) => render_preview_row(&mut out, event),
                    None => out.push_str("**[...] Step ...**\n- URL: ...\n\n"),
                }
            }
        }
        out.push('\n');
    }
    out
}

/// First five events, then an ellipsis and the last two when the timeline
/// is long enough that the middle would drown the report.
fn preview_rows(events: &[TimelineEvent]) -> Vec<Option<&TimelineEvent>> {
    let mut rows: Vec<Option<&TimelineEvent>> = events.iter().take(5).map(Some).collect();
    if events.len() > 7 {
        rows.push(None);
        rows.extend(events[events.len() - 2..].iter().map(Some));
    } else if events.len() > 5 {
        rows.extend(events[5..].iter().map(Some));
    }
    rows
}

fn render_preview_row(out: &mut String, event: &TimelineEvent) {
    out.push_str(&format!(
        "**[{}] Step {}**\n",
        event.t_formatted, event.step_number
    ));
    out.push_str(&format!(
        "- URL: {}\n",
        truncate_chars(event.url.as_deref().unwrap_or(""), 60)
    ));

    if let Some(memory) = event.memory.as_deref().filter(|m| !m.is_empty()) {
        let mut plan = truncate_chars(memory, 200).replace('\n', " ");
        if memory.chars().count() > 200 {
            plan.push_str("...");
        }
        out.push_str(&format!("- **Agent's Plan:** {plan}\n"));
    }
    if !event.actions.is_empty() {
        out.push_str(&format!("- **Actions:** {} action(s)\n", event.actions.len()));
    }
    if let Some(shot) = event.screenshot_url.as_deref().filter(|s| !s.is_empty()) {
        out.push_str(&format!("- **Screenshot:** {shot}\n"));
    }
    out.push('\n');
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
