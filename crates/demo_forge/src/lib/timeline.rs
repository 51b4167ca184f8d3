//! Step timelines captured while a browser agent executes a course.
//!
//! Browser-Use reports agent steps as they happen; each new step is folded
//! into a [`TimelineEvent`] carrying the wall-clock offset since the task
//! started. Those offsets later drive narration timing and the ffmpeg
//! overlay windows.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::browser::TaskStep;

/// A single agent step, stamped with its offset into the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub step_number: u32,
    /// Seconds since the task started, rounded to two decimals.
    pub t_offset_s: f64,
    /// Same offset rendered as `MM:SS` for reports.
    pub t_formatted: String,
    pub url: Option<String>,
    pub screenshot_url: Option<String>,
    pub memory: Option<String>,
    pub next_goal: Option<String>,
    pub evaluation_previous_goal: Option<String>,
    /// Raw action payloads as JSON strings, in execution order.
    pub actions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl TimelineEvent {
    pub fn from_step(step: &TaskStep, position: usize, elapsed: Duration) -> Self {
        let offset = (elapsed.as_secs_f64() * 100.0).round() / 100.0;
        Self {
            step_number: step.number.unwrap_or(position as u32 + 1),
            t_offset_s: offset,
            t_formatted: format_mmss(offset),
            url: step.url.clone(),
            screenshot_url: step.screenshot_url.clone(),
            memory: step.memory.clone(),
            next_goal: step.next_goal.clone(),
            evaluation_previous_goal: step.evaluation_previous_goal.clone(),
            actions: step.actions.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Everything needed to narrate and document one executed course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseTimeline {
    pub course_index: usize,
    pub course_title: String,
    pub session_id: String,
    pub task_id: String,
    pub recording_url: Option<String>,
    pub duration_seconds: f64,
    pub total_steps: usize,
    pub events: Vec<TimelineEvent>,
}

/// Renders a second offset as `MM:SS`.
pub fn format_mmss(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Decodes a raw Browser-Use action payload into a human-readable line.
///
/// Returns `None` when the payload is not a single-key JSON object; callers
/// that need a string no matter what should use [`describe_action_or_raw`].
pub fn describe_action(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let obj = value.as_object()?;
    let (name, params) = obj.iter().next()?;

    Some(match name.as_str() {
        "click" => format!("Click element #{}", element_index(params)),
        "input" => {
            let text = params.get("text").and_then(|v| v.as_str()).unwrap_or("");
            format!("Type into element #{}: `{}`", element_index(params), masked(text))
        }
        "scroll" => {
            if params.get("down").and_then(|v| v.as_bool()).unwrap_or(true) {
                "Scroll down".to_string()
            } else {
                "Scroll up".to_string()
            }
        }
        "wait" => match params.get("seconds").and_then(|v| v.as_i64()) {
            Some(seconds) => format!("Wait {seconds} seconds"),
            None => "Wait".to_string(),
        },
        "find_text" => format!(
            "Find text: \"{}\"",
            params.get("text").and_then(|v| v.as_str()).unwrap_or("")
        ),
        "navigate" => format!(
            "Navigate to {}",
            params.get("url").and_then(|v| v.as_str()).unwrap_or("")
        ),
        _ => format!("{name}: {params}"),
    })
}

/// Like [`describe_action`] but falls back to a truncated raw payload.
pub fn describe_action_or_raw(raw: &str) -> String {
    describe_action(raw).unwrap_or_else(|| format!("Raw: {}", truncate_chars(raw, 100)))
}

fn element_index(params: &serde_json::Value) -> String {
    params
        .get("index")
        .and_then(|v| v.as_i64())
        .map(|i| i.to_string())
        .unwrap_or_else(|| "?".into())
}

/// Typed-in credentials show up in action payloads; anything long that
/// contains a password special character is redacted.
fn masked(text: &str) -> &str {
    let is_sensitive = text.chars().count() > 12 && text.chars().any(|c| "!@#$%".contains(c));
    if is_sensitive {
        "***"
    } else {
        text
    }
}

/// Truncates on a char boundary so multi-byte input never panics.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
