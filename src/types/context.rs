//! Context build types: budgets, encoded files, exclusions, segments and results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::types::workspace::ContextScope;

/// Byte and token ceilings governing inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextBudget {
    pub max_bytes_per_file: usize,
    pub max_tokens_per_file: usize,
    pub max_total_bytes: usize,
    pub max_total_tokens: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_bytes_per_file: 200_000,
            max_tokens_per_file: 50_000,
            max_total_bytes: 1_000_000,
            max_total_tokens: 250_000,
        }
    }
}

/// What happens to a file that exceeds one per-file limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitPolicy {
    #[default]
    Exclude,
    Truncate,
}

/// Per-limit-type choice between exclusion and truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TruncationPolicy {
    #[serde(default)]
    pub per_file_bytes: LimitPolicy,
    #[serde(default)]
    pub per_file_tokens: LimitPolicy,
}

/// Aggregate limits for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentLimits {
    pub max_tokens_per_segment: usize,
    pub max_bytes_per_segment: usize,
}

impl Default for SegmentLimits {
    fn default() -> Self {
        Self {
            max_tokens_per_segment: 32_000,
            max_bytes_per_segment: 128_000,
        }
    }
}

/// A file's text as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub relative_path: String,
    pub contents: String,
}

/// Why a file's content was trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TruncationReason {
    PerFileBytes { limit: usize },
    PerFileTokens { limit: usize },
}

impl fmt::Display for TruncationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerFileBytes { limit } => {
                write!(f, "Truncated to per-file bytes limit: {}", limit)
            }
            Self::PerFileTokens { limit } => {
                write!(f, "Truncated to per-file tokens limit: {}", limit)
            }
        }
    }
}

/// Record of a partial inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncation {
    pub reason: TruncationReason,
    pub original_bytes: usize,
    pub original_tokens: usize,
}

/// A loaded file annotated with size metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedFile {
    /// Canonical absolute path
    pub path: PathBuf,
    /// Path relative to the workspace root
    pub relative_path: String,
    /// Language tag, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// File text (possibly trimmed)
    pub contents: String,
    /// Byte length of `contents`
    pub byte_count: usize,
    /// Estimated token count of `contents`
    pub token_count: usize,
    /// SHA-256 of `contents`
    pub content_hash: String,
    /// Set when `contents` was trimmed to a per-file limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<Truncation>,
}

impl EncodedFile {
    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some()
    }
}

/// Why a candidate file was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionReason {
    ExceedsPerFileBytes { limit: usize },
    ExceedsPerFileTokens { limit: usize },
    ExceedsTotalBytes { limit: usize },
    ExceedsTotalTokens { limit: usize },
}

impl ExclusionReason {
    /// The configured limit that was exceeded.
    pub fn limit(&self) -> usize {
        match *self {
            Self::ExceedsPerFileBytes { limit }
            | Self::ExceedsPerFileTokens { limit }
            | Self::ExceedsTotalBytes { limit }
            | Self::ExceedsTotalTokens { limit } => limit,
        }
    }

    pub fn is_total(&self) -> bool {
        matches!(
            self,
            Self::ExceedsTotalBytes { .. } | Self::ExceedsTotalTokens { .. }
        )
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExceedsPerFileBytes { limit } => {
                write!(f, "Exceeds per-file bytes limit: {}", limit)
            }
            Self::ExceedsPerFileTokens { limit } => {
                write!(f, "Exceeds per-file tokens limit: {}", limit)
            }
            Self::ExceedsTotalBytes { limit } => write!(f, "Exceeds total bytes limit: {}", limit),
            Self::ExceedsTotalTokens { limit } => {
                write!(f, "Exceeds total tokens limit: {}", limit)
            }
        }
    }
}

/// A candidate file that was excluded, with its measured size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextExclusion {
    pub path: PathBuf,
    pub relative_path: String,
    pub byte_count: usize,
    pub token_count: usize,
    pub reason: ExclusionReason,
}

/// A candidate that could not be read. Diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub relative_path: String,
    pub message: String,
}

/// Ordered, non-splittable group of files sent together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSegment {
    /// Zero-based position in the segment list
    pub index: usize,
    pub files: Vec<EncodedFile>,
    pub total_bytes: usize,
    pub total_tokens: usize,
}

/// Output of one context build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBuildResult {
    pub build_id: Uuid,
    /// RFC 3339 time the build finished
    pub built_at: String,
    pub snapshot_hash: String,
    pub scope: ContextScope,
    /// Files included in full
    pub attachments: Vec<EncodedFile>,
    /// Files included after trimming
    pub truncated: Vec<EncodedFile>,
    pub excluded: Vec<ContextExclusion>,
    pub load_failures: Vec<LoadFailure>,
    pub total_bytes: usize,
    pub total_tokens: usize,
    pub budget: ContextBudget,
    pub segment_limits: SegmentLimits,
    pub segments: Vec<ContextSegment>,
}

impl ContextBuildResult {
    /// Admitted files (attachments and truncated) in path order.
    pub fn admitted_files(&self) -> impl Iterator<Item = &EncodedFile> {
        self.segments.iter().flat_map(|s| s.files.iter())
    }

    pub fn admitted_count(&self) -> usize {
        self.attachments.len() + self.truncated.len()
    }
}

/// Why a build produced nothing to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoContextReason {
    /// Selection scope with no selected file
    NoSelection,
    /// The scope resolved to zero candidates
    EmptyScope,
    /// Every candidate failed to load
    NothingLoaded,
}

impl fmt::Display for NoContextReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSelection => f.write_str("No file is selected"),
            Self::EmptyScope => f.write_str("The chosen scope contains no files"),
            Self::NothingLoaded => f.write_str("None of the files in scope could be read"),
        }
    }
}

/// Outcome of a build that was not cancelled and did not fail structurally.
#[derive(Debug, Clone)]
pub enum ContextOutcome {
    Built(ContextBuildResult),
    NoContext(NoContextReason),
}

impl ContextOutcome {
    pub fn result(&self) -> Option<&ContextBuildResult> {
        match self {
            Self::Built(result) => Some(result),
            Self::NoContext(_) => None,
        }
    }

    pub fn into_result(self) -> Option<ContextBuildResult> {
        match self {
            Self::Built(result) => Some(result),
            Self::NoContext(_) => None,
        }
    }
}

/// Per-file line in the presentation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFileSummary {
    pub path: String,
    pub bytes: usize,
    pub tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Read-only summary handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub scope: ContextScope,
    pub attached: Vec<ContextFileSummary>,
    pub truncated: Vec<ContextFileSummary>,
    pub excluded: Vec<ContextFileSummary>,
    pub unreadable: Vec<String>,
    pub segment_count: usize,
    pub total_bytes: usize,
    pub total_tokens: usize,
    pub max_total_bytes: usize,
    pub max_total_tokens: usize,
}

impl From<&ContextBuildResult> for ContextSnapshot {
    fn from(result: &ContextBuildResult) -> Self {
        let summarize = |file: &EncodedFile| ContextFileSummary {
            path: file.relative_path.clone(),
            bytes: file.byte_count,
            tokens: file.token_count,
            note: file.truncation.map(|t| t.reason.to_string()),
        };

        Self {
            scope: result.scope,
            attached: result.attachments.iter().map(summarize).collect(),
            truncated: result.truncated.iter().map(summarize).collect(),
            excluded: result
                .excluded
                .iter()
                .map(|e| ContextFileSummary {
                    path: e.relative_path.clone(),
                    bytes: e.byte_count,
                    tokens: e.token_count,
                    note: Some(e.reason.to_string()),
                })
                .collect(),
            unreadable: result
                .load_failures
                .iter()
                .map(|f| f.relative_path.clone())
                .collect(),
            segment_count: result.segments.len(),
            total_bytes: result.total_bytes,
            total_tokens: result.total_tokens,
            max_total_bytes: result.budget.max_total_bytes,
            max_total_tokens: result.budget.max_total_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusion_reason_display() {
        let cases = [
            (
                ExclusionReason::ExceedsPerFileBytes { limit: 1000 },
                "Exceeds per-file bytes limit: 1000",
            ),
            (
                ExclusionReason::ExceedsPerFileTokens { limit: 250 },
                "Exceeds per-file tokens limit: 250",
            ),
            (
                ExclusionReason::ExceedsTotalBytes { limit: 4096 },
                "Exceeds total bytes limit: 4096",
            ),
            (
                ExclusionReason::ExceedsTotalTokens { limit: 1024 },
                "Exceeds total tokens limit: 1024",
            ),
        ];

        for (reason, expected) in &cases {
            assert_eq!(reason.to_string(), *expected);
        }
    }

    #[test]
    fn test_exclusion_reason_limit() {
        let reason = ExclusionReason::ExceedsTotalTokens { limit: 77 };
        assert_eq!(reason.limit(), 77);
        assert!(reason.is_total());
        assert!(!ExclusionReason::ExceedsPerFileBytes { limit: 1 }.is_total());
    }

    #[test]
    fn test_exclusion_reason_serialization() {
        let json =
            serde_json::to_string(&ExclusionReason::ExceedsPerFileBytes { limit: 1000 }).unwrap();
        assert_eq!(json, r#"{"kind":"exceeds_per_file_bytes","limit":1000}"#);
    }

    #[test]
    fn test_truncation_policy_defaults_to_exclude() {
        let policy: TruncationPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.per_file_bytes, LimitPolicy::Exclude);
        assert_eq!(policy.per_file_tokens, LimitPolicy::Exclude);
    }

    #[test]
    fn test_no_context_reason_display() {
        assert_eq!(NoContextReason::NoSelection.to_string(), "No file is selected");
    }
}
