//! Workspace session: the current snapshot plus per-conversation builds.
//!
//! The session owns no mutable tree state beyond an `Arc` to the latest
//! snapshot. Every change (rescan, selection, inclusion toggle) publishes a
//! new snapshot; readers holding the old `Arc` keep a consistent view.
//!
//! Builds are tracked per conversation. Starting a build supersedes the
//! previous one for the same conversation by cancelling its token.
//!
//! The session holds no mutation capability. Applying a change goes through
//! [`crate::assistant::ChangeApplier`], which is constructed separately.

use dashmap::DashMap;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::assistant::{AssistantClient, AssistantMessage, AssistantRequest};
use crate::context::loader::FileLoader;
use crate::context::pipeline::{ContextPipeline, PipelineOptions};
use crate::context::prompt::{compose_prompt, render_segments};
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::types::{
    ContextInclusionState, ContextOutcome, ContextScope, ContextSnapshot, NoContextReason,
    WorkspaceSnapshot,
};
use crate::workspace::boundary::BoundaryFilter;
use crate::workspace::fs::FileSystemAccess;
use crate::workspace::preferences::InclusionPreferences;
use crate::workspace::snapshot::{apply_preferences, SnapshotBuilder};

/// Result of asking the assistant about the workspace.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AskReply {
    /// Messages returned by the assistant (empty when nothing was sent)
    pub messages: Vec<AssistantMessage>,
    /// Summary of the context that was built
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextSnapshot>,
    /// Set when no context could be built
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_context: Option<NoContextReason>,
}

/// Per-workspace state shared by the presentation and messaging layers.
pub struct WorkspaceSession {
    builder: SnapshotBuilder,
    pipeline: ContextPipeline,
    preferences: RwLock<InclusionPreferences>,
    snapshot: RwLock<Option<Arc<WorkspaceSnapshot>>>,
    inflight: DashMap<String, (Uuid, CancellationToken)>,
    metrics: Arc<Metrics>,
}

impl WorkspaceSession {
    pub fn new(
        fs: Arc<dyn FileSystemAccess>,
        loader: Arc<dyn FileLoader>,
        filter: BoundaryFilter,
        options: PipelineOptions,
    ) -> Self {
        Self {
            builder: SnapshotBuilder::new(fs, filter),
            pipeline: ContextPipeline::new(loader, options),
            preferences: RwLock::new(InclusionPreferences::new()),
            snapshot: RwLock::new(None),
            inflight: DashMap::new(),
            metrics: Metrics::new(),
        }
    }

    /// Seed inclusion overrides used by subsequent scans.
    pub fn with_preferences(mut self, preferences: InclusionPreferences) -> Self {
        self.preferences = RwLock::new(preferences);
        self
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub async fn preferences(&self) -> InclusionPreferences {
        self.preferences.read().await.clone()
    }

    /// Open a workspace. The new snapshot is published only if the scan succeeds.
    pub async fn open(&self, root: &Path) -> Result<Arc<WorkspaceSnapshot>> {
        self.scan(root, false).await
    }

    /// Rescan the open workspace, keeping the selection if it still exists.
    pub async fn refresh(&self) -> Result<Arc<WorkspaceSnapshot>> {
        let current = self.snapshot().await?;
        self.scan(&current.root, true).await
    }

    /// The current snapshot.
    pub async fn snapshot(&self) -> Result<Arc<WorkspaceSnapshot>> {
        self.snapshot.read().await.clone().ok_or(Error::NoWorkspace)
    }

    /// Change the selection. Unknown paths clear it.
    pub async fn select(&self, path: Option<&Path>) -> Result<Arc<WorkspaceSnapshot>> {
        let mut guard = self.snapshot.write().await;
        let current = guard.as_ref().ok_or(Error::NoWorkspace)?;
        let next = Arc::new(current.with_selection(path));
        *guard = Some(next.clone());
        Ok(next)
    }

    /// Toggle one path's inclusion and remember it in the preferences.
    pub async fn set_inclusion(
        &self,
        path: &Path,
        state: ContextInclusionState,
    ) -> Result<Arc<WorkspaceSnapshot>> {
        let mut guard = self.snapshot.write().await;
        let current = guard.as_ref().ok_or(Error::NoWorkspace)?;
        let next = current
            .with_inclusion(path, state)
            .ok_or_else(|| Error::FileNotFound(path.display().to_string()))?;
        if let Some(resolved) = current.resolve_path(path) {
            self.preferences.write().await.set(resolved, state);
        }
        let next = Arc::new(next);
        *guard = Some(next.clone());
        Ok(next)
    }

    /// Build context for a conversation, superseding any build in flight for it.
    pub async fn build_context(
        &self,
        conversation_id: &str,
        scope: ContextScope,
    ) -> Result<ContextOutcome> {
        let (build_key, token) = self.begin(conversation_id);
        let outcome = self.run_build(scope, &token).await;
        self.finish(conversation_id, build_key);
        outcome
    }

    /// Cancel the build in flight for a conversation, if any.
    pub fn cancel(&self, conversation_id: &str) -> bool {
        match self.inflight.get(conversation_id) {
            Some(entry) => {
                entry.value().1.cancel();
                true
            }
            None => false,
        }
    }

    /// Build context and send it to the assistant.
    ///
    /// When the scope yields nothing, or every file was excluded, the client
    /// is not called and no messages are returned.
    pub async fn ask(
        &self,
        client: &dyn AssistantClient,
        conversation_id: &str,
        question: &str,
        scope: ContextScope,
    ) -> Result<AskReply> {
        let (build_key, token) = self.begin(conversation_id);
        let reply = self
            .ask_with_token(client, conversation_id, question, scope, &token)
            .await;
        self.finish(conversation_id, build_key);
        reply
    }

    async fn ask_with_token(
        &self,
        client: &dyn AssistantClient,
        conversation_id: &str,
        question: &str,
        scope: ContextScope,
        token: &CancellationToken,
    ) -> Result<AskReply> {
        let result = match self.run_build(scope, token).await? {
            ContextOutcome::Built(result) => result,
            ContextOutcome::NoContext(reason) => {
                return Ok(AskReply {
                    no_context: Some(reason),
                    ..AskReply::default()
                })
            }
        };

        let summary = ContextSnapshot::from(&result);
        if result.segments.is_empty() {
            info!("Every candidate was excluded; not contacting the assistant");
            return Ok(AskReply {
                context: Some(summary),
                ..AskReply::default()
            });
        }

        if token.is_cancelled() {
            self.metrics.inc_cancelled();
            return Err(Error::Cancelled);
        }

        let request = AssistantRequest {
            conversation_id: conversation_id.to_string(),
            build_id: result.build_id,
            question: question.to_string(),
            prompt: compose_prompt(question, &result),
            segments: render_segments(&result),
        };

        self.metrics.inc_assistant_calls();
        let messages = tokio::select! {
            biased;
            _ = token.cancelled() => {
                self.metrics.inc_cancelled();
                return Err(Error::Cancelled);
            }
            messages = client.send(request) => messages?,
        };

        Ok(AskReply {
            messages,
            context: Some(summary),
            no_context: None,
        })
    }

    async fn run_build(
        &self,
        scope: ContextScope,
        token: &CancellationToken,
    ) -> Result<ContextOutcome> {
        let snapshot = self.snapshot().await?;
        self.metrics.inc_builds();

        match self.pipeline.build(&snapshot, scope, token).await {
            Ok(ContextOutcome::Built(result)) => {
                self.metrics.record_result(&result);
                Ok(ContextOutcome::Built(result))
            }
            Ok(ContextOutcome::NoContext(reason)) => {
                self.metrics.record_empty(reason);
                Ok(ContextOutcome::NoContext(reason))
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.metrics.inc_cancelled();
                }
                Err(e)
            }
        }
    }

    async fn scan(&self, root: &Path, keep_selection: bool) -> Result<Arc<WorkspaceSnapshot>> {
        let preferences = self.preferences.read().await.clone();
        let mut scanned = self.builder.build(root, None, &preferences).await?;
        self.metrics.inc_snapshots();

        // Selection and inclusion may change while the tree is walked. Both
        // are taken from the published state under the write lock.
        let mut guard = self.snapshot.write().await;
        let selection = match guard.as_ref() {
            Some(current) if keep_selection && current.root == scanned.root => {
                current.selected_path.clone()
            }
            _ => None,
        };
        apply_preferences(&mut scanned, &*self.preferences.read().await);
        if let Some(path) = selection {
            scanned = scanned.with_selection(Some(path.as_path()));
            if scanned.selected_path.is_none() {
                info!("Selection {:?} no longer exists, clearing", path);
            }
        }

        let snapshot = Arc::new(scanned);
        *guard = Some(snapshot.clone());
        Ok(snapshot)
    }

    fn begin(&self, conversation_id: &str) -> (Uuid, CancellationToken) {
        let key = Uuid::new_v4();
        let token = CancellationToken::new();
        if let Some((_, (_, previous))) = self.inflight.remove(conversation_id) {
            debug!("Superseding in-flight build for {}", conversation_id);
            previous.cancel();
        }
        self.inflight
            .insert(conversation_id.to_string(), (key, token.clone()));
        (key, token)
    }

    fn finish(&self, conversation_id: &str, key: Uuid) {
        self.inflight
            .remove_if(conversation_id, |_, (current, _)| *current == key);
    }
}
