//! The context build pipeline.
//!
//! Scope resolution, loading, encoding, budgeting and segmentation run as
//! one unit of work over an immutable snapshot. The pipeline only reads.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::budget::BudgetEnforcer;
use crate::context::encoder::encode_all;
use crate::context::loader::{load_all, FileLoader, DEFAULT_MAX_CONCURRENT_READS};
use crate::context::segmenter::segment;
use crate::error::{Error, Result};
use crate::types::{
    ContextBudget, ContextBuildResult, ContextOutcome, ContextScope, NoContextReason,
    SegmentLimits, TruncationPolicy, WorkspaceSnapshot,
};
use crate::workspace::scope::resolve_scope;

/// Limits and policies for one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOptions {
    #[serde(default)]
    pub budget: ContextBudget,
    #[serde(default)]
    pub truncation: TruncationPolicy,
    #[serde(default)]
    pub segments: SegmentLimits,
    #[serde(default = "default_max_concurrent_reads")]
    pub max_concurrent_reads: usize,
}

fn default_max_concurrent_reads() -> usize {
    DEFAULT_MAX_CONCURRENT_READS
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            budget: ContextBudget::default(),
            truncation: TruncationPolicy::default(),
            segments: SegmentLimits::default(),
            max_concurrent_reads: DEFAULT_MAX_CONCURRENT_READS,
        }
    }
}

/// Builds [`ContextBuildResult`]s from snapshots.
#[derive(Clone)]
pub struct ContextPipeline {
    loader: Arc<dyn FileLoader>,
    options: PipelineOptions,
}

impl ContextPipeline {
    pub fn new(loader: Arc<dyn FileLoader>, options: PipelineOptions) -> Self {
        Self { loader, options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run one build.
    ///
    /// Returns `NoContext` when the scope yields nothing to send, and
    /// `Error::Cancelled` as soon as cancellation is observed. A cancelled
    /// build does no further budget or segmentation work.
    pub async fn build(
        &self,
        snapshot: &WorkspaceSnapshot,
        scope: ContextScope,
        cancel: &CancellationToken,
    ) -> Result<ContextOutcome> {
        let start_time = Instant::now();
        ensure_active(cancel)?;

        let candidates = resolve_scope(snapshot, scope);
        if candidates.is_empty() {
            let selected_file = snapshot.selected().is_some_and(|d| d.is_file());
            let reason = if scope.requires_selection() && !selected_file {
                NoContextReason::NoSelection
            } else {
                NoContextReason::EmptyScope
            };
            info!("No context built for {:?} scope: {}", scope, reason);
            return Ok(ContextOutcome::NoContext(reason));
        }
        debug!("Resolved {} candidates for {:?} scope", candidates.len(), scope);

        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            report = load_all(
                self.loader.as_ref(),
                &snapshot.root,
                &candidates,
                self.options.max_concurrent_reads,
            ) => report,
        };
        ensure_active(cancel)?;

        if report.loaded.is_empty() {
            warn!(
                "All {} candidates failed to load for {:?} scope",
                report.failures.len(),
                scope
            );
            return Ok(ContextOutcome::NoContext(NoContextReason::NothingLoaded));
        }

        let encoded = encode_all(report.loaded);
        ensure_active(cancel)?;

        let enforcer = BudgetEnforcer::new(self.options.budget, self.options.truncation);
        let outcome = enforcer.enforce(encoded);
        ensure_active(cancel)?;

        let attachments = outcome.attachments();
        let truncated = outcome.truncated();
        let segments = segment(outcome.admitted, self.options.segments);

        let result = ContextBuildResult {
            build_id: Uuid::new_v4(),
            built_at: chrono::Utc::now().to_rfc3339(),
            snapshot_hash: snapshot.snapshot_hash.clone(),
            scope,
            attachments,
            truncated,
            excluded: outcome.excluded,
            load_failures: report.failures,
            total_bytes: outcome.total_bytes,
            total_tokens: outcome.total_tokens,
            budget: self.options.budget,
            segment_limits: self.options.segments,
            segments,
        };

        info!(
            "Context built: {} attached, {} truncated, {} excluded, {} unreadable, {} segments, {} tokens in {}ms",
            result.attachments.len(),
            result.truncated.len(),
            result.excluded.len(),
            result.load_failures.len(),
            result.segments.len(),
            result.total_tokens,
            start_time.elapsed().as_millis()
        );

        Ok(ContextOutcome::Built(result))
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        debug!("Context build cancelled");
        return Err(Error::Cancelled);
    }
    Ok(())
}
