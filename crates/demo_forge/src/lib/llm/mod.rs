//! LLM seams and helpers.
//!
//! Four narrow traits cover the pipeline's language-model needs: pulling a
//! verification URL out of an email, designing courses, scripting narration
//! and writing MDX docs. [`openai::OpenAIClient`] implements all of them.

mod designer;
mod doc_writer;
mod extractor;
mod narrator;
pub mod openai;

use std::sync::LazyLock;

use another_tiktoken_rs::CoreBPE;
use regex::Regex;

pub use designer::CourseDesigner;
pub use doc_writer::DocWriter;
pub use extractor::VerificationExtractor;
pub use narrator::Narrator;
pub use openai::{CompletionParams, OpenAIClient, OpenAIError};

use crate::timeline::truncate_chars;

static BPE: LazyLock<Option<CoreBPE>> = LazyLock::new(|| another_tiktoken_rs::o200k_base().ok());

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:mdx|markdown)?\s*\n(.*?)\n```").expect("valid regex"));

/// Counts o200k tokens; `None` when the tokenizer failed to load.
pub(crate) fn token_count(text: &str) -> Option<usize> {
    BPE.as_ref()
        .map(|bpe| bpe.encode_with_special_tokens(text).len())
}

/// Hard-truncates a prompt that overruns `limit` tokens, so oversized
/// timelines degrade to a shorter prompt instead of a failed request.
pub(crate) fn clamp_to_context(prompt: String, limit: usize) -> String {
    match token_count(&prompt) {
        Some(tokens) if tokens > limit => {
            tracing::warn!(tokens, limit, "Prompt exceeds context window, truncating");
            // 3 chars per token stays safely under the limit
            truncate_chars(&prompt, limit * 3).to_string()
        }
        _ => prompt,
    }
}

/// Unwraps LLM output that arrived fenced in a markdown code block.
pub(crate) fn strip_code_fences(content: &str) -> String {
    if let Some(caps) = FENCE_RE.captures(content) {
        return caps[1].to_string();
    }
    let trimmed = content.trim();
    if trimmed.starts_with("```") && trimmed.ends_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() >= 2 {
            return lines[1..lines.len() - 1].join("\n").trim().to_string();
        }
    }
    trimmed.to_string()
}
