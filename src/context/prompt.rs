//! Prompt rendering for the messaging collaborator.
//!
//! Defines the content and order of what is sent: one
//! `## Context Segment N of M` header per segment, files in path order.

use std::fmt::Write;

use crate::types::{ContextBuildResult, ContextSegment, EncodedFile};

/// Render one segment. `index` is zero-based; headers are one-based.
pub fn render_segment(segment: &ContextSegment, total: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## Context Segment {} of {}", segment.index + 1, total);
    for file in &segment.files {
        out.push('\n');
        render_file(&mut out, file);
    }
    out
}

/// Render every segment in order.
pub fn render_segments(result: &ContextBuildResult) -> Vec<String> {
    let total = result.segments.len();
    result
        .segments
        .iter()
        .map(|segment| render_segment(segment, total))
        .collect()
}

/// Format the question together with all context segments.
pub fn compose_prompt(question: &str, result: &ContextBuildResult) -> String {
    let mut out = format!("# User Request\n{}\n\n# Workspace Context\n", question.trim());
    for rendered in render_segments(result) {
        out.push('\n');
        out.push_str(&rendered);
    }
    out
}

fn render_file(out: &mut String, file: &EncodedFile) {
    let mut details = Vec::new();
    if let Some(lang) = &file.language {
        details.push(lang.clone());
    }
    details.push(format!("{} bytes", file.byte_count));
    if let Some(truncation) = &file.truncation {
        details.push(format!(
            "truncated from {} bytes",
            truncation.original_bytes
        ));
    }

    let fence = fence_for(&file.contents);
    let _ = writeln!(out, "### File: {} ({})", file.relative_path, details.join(", "));
    let _ = writeln!(out, "{}{}", fence, file.language.as_deref().unwrap_or(""));
    out.push_str(&file.contents);
    if !file.contents.ends_with('\n') {
        out.push('\n');
    }
    let _ = writeln!(out, "{}", fence);
}

/// A backtick fence longer than any backtick run inside `contents`.
fn fence_for(contents: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in contents.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}
