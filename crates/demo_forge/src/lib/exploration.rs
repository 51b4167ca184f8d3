//! Parsing of the structured analysis a browser agent writes at the end of
//! a product exploration.
//!
//! The exploration mission asks the agent to emit its findings between
//! `---START OF ANALYSIS---` and `---END OF ANALYSIS---` markers, with
//! `## PRODUCT OVERVIEW`, `## HIGH-LEVEL USER ACTIONS`, `## PRODUCT WORKFLOW`
//! and `## ADDITIONAL OBSERVATIONS` sections. Agents mostly comply; when
//! they do not, parsing degrades to empty fields rather than failing, and
//! the raw text is always preserved.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{browser::TaskStatus, mail::Credentials};

static ACTION_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"### ACTION #\d+:").expect("valid regex"));

const START_MARKER: &str = "---START OF ANALYSIS---";
const END_MARKER: &str = "---END OF ANALYSIS---";

/// One high-level user action the agent identified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedAction {
    pub name: String,
    pub how_to_start: String,
    pub what_it_does: String,
    pub purpose: String,
}

/// The parsed exploration analysis, plus the untouched raw text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductAnalysis {
    pub product_overview: String,
    pub actions: Vec<AnalyzedAction>,
    pub workflow: String,
    pub observations: String,
    pub raw_output: String,
}

/// Everything recorded about one product exploration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationReport {
    pub product_url: String,
    pub explored_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub credentials: Credentials,
    pub session_id: String,
    pub task_id: String,
    pub live_url: Option<String>,
    pub share_url: Option<String>,
    pub status: TaskStatus,
    pub success: bool,
    pub analysis: ProductAnalysis,
}

/// Parses the agent's final output into a [`ProductAnalysis`].
pub fn parse_analysis(raw: &str) -> ProductAnalysis {
    let body = analysis_body(raw);

    ProductAnalysis {
        product_overview: section(body, "## PRODUCT OVERVIEW")
            .unwrap_or_default()
            .to_string(),
        actions: section(body, "## HIGH-LEVEL USER ACTIONS")
            .map(parse_actions)
            .unwrap_or_default(),
        workflow: section(body, "## PRODUCT WORKFLOW")
            .unwrap_or_default()
            .to_string(),
        observations: section(body, "## ADDITIONAL OBSERVATIONS")
            .unwrap_or_default()
            .to_string(),
        raw_output: raw.to_string(),
    }
}

/// Narrows the raw output to the text between the analysis markers, keeping
/// everything when either marker is missing.
fn analysis_body(raw: &str) -> &str {
    let rest = match raw.split_once(START_MARKER) {
        Some((_, rest)) => rest,
        None => raw,
    };
    match rest.split_once(END_MARKER) {
        Some((body, _)) => body,
        None => rest,
    }
}

/// Returns the trimmed text of a `## `-level section, up to the next one.
fn section<'a>(text: &'a str, header: &str) -> Option<&'a str> {
    let start = text.find(header)? + header.len();
    let rest = &text[start..];
    let end = rest.find("\n## ").unwrap_or(rest.len());
    Some(rest[..end].trim())
}

fn parse_actions(actions_text: &str) -> Vec<AnalyzedAction> {
    ACTION_SPLIT_RE
        .split(actions_text)
        .skip(1)
        .filter_map(|block| {
            let name = block
                .lines()
                .next()?
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .trim()
                .to_string();
            if name.is_empty() {
                return None;
            }
            Some(AnalyzedAction {
                name,
                how_to_start: action_field(block, "**How to Start"),
                what_it_does: action_field(block, "**What This Action Does"),
                purpose: action_field(block, "**Purpose"),
            })
        })
        .collect()
}

/// Extracts the text under one `**Marker ...:**` label, cut at the next
/// label or action heading.
fn action_field(block: &str, marker: &str) -> String {
    let Some(pos) = block.find(marker) else {
        return String::new();
    };
    let rest = &block[pos + marker.len()..];
    // skip the remainder of the label itself, e.g. ` (from home page):**`
    let rest = match rest.find("**") {
        Some(close) => &rest[close + 2..],
        None => rest,
    };
    let end = ["\n**How to Start", "\n**What This Action Does", "\n**Purpose", "\n###"]
        .iter()
        .filter_map(|m| rest.find(m))
        .min()
        .unwrap_or(rest.len());
    rest[..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"I explored the product and here is my analysis.

---START OF ANALYSIS---

## PRODUCT OVERVIEW

**Product Name:** Notesy
**URL:** https://notesy.test
**Category:** Note taking
**What This Product Is:** A collaborative notes app.
**Core Purpose:** Capture and share notes.

## HIGH-LEVEL USER ACTIONS

### ACTION #1: [Create a Note]
**How to Start (from home page when logged in):**
1. Click the "New Note" button in the sidebar

**What This Action Does:**
Opens a blank note editor.

**Purpose in the Product:**
Core content creation flow.

### ACTION #2: [Share a Note]
**How to Start (from home page when logged in):**
1. Open a note
2. Click "Share"

**What This Action Does:**
Generates a share link.

**Purpose in the Product:**
Collaboration.

## PRODUCT WORKFLOW

Sign up, create notes, share them with teammates.

## ADDITIONAL OBSERVATIONS

There is a hidden keyboard shortcut palette.

---END OF ANALYSIS---
"#;

    #[test]
    fn parses_every_section_of_a_complete_analysis() {
        let analysis = parse_analysis(SAMPLE);

        assert!(analysis.product_overview.contains("**Product Name:** Notesy"));
        assert!(!analysis.product_overview.contains("## HIGH-LEVEL"));
        assert_eq!(analysis.workflow, "Sign up, create notes, share them with teammates.");
        assert_eq!(
            analysis.observations,
            "There is a hidden keyboard shortcut palette."
        );
        assert_eq!(analysis.raw_output, SAMPLE);
    }

    #[test]
    fn parses_actions_with_their_subsections() {
        let analysis = parse_analysis(SAMPLE);

        assert_eq!(analysis.actions.len(), 2);
        let first = &analysis.actions[0];
        assert_eq!(first.name, "Create a Note");
        assert_eq!(
            first.how_to_start,
            "1. Click the \"New Note\" button in the sidebar"
        );
        assert_eq!(first.what_it_does, "Opens a blank note editor.");
        assert_eq!(first.purpose, "Core content creation flow.");
        assert_eq!(analysis.actions[1].name, "Share a Note");
    }

    #[test]
    fn unstructured_output_degrades_to_empty_fields() {
        let analysis = parse_analysis("The agent rambled and never wrote the report.");

        assert!(analysis.product_overview.is_empty());
        assert!(analysis.actions.is_empty());
        assert!(analysis.workflow.is_empty());
        assert!(analysis.observations.is_empty());
        assert_eq!(
            analysis.raw_output,
            "The agent rambled and never wrote the report."
        );
    }

    #[test]
    fn tolerates_missing_markers() {
        let raw = "## PRODUCT OVERVIEW\n\nJust the overview.\n";
        let analysis = parse_analysis(raw);
        assert_eq!(analysis.product_overview, "Just the overview.");
    }
}
