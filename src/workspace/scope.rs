//! Scope resolution: which files of a snapshot are context candidates.

use std::path::PathBuf;

use crate::types::{ContextInclusionState, ContextScope, WorkspaceSnapshot};

impl ContextScope {
    /// Scopes that are anchored on the selected file.
    pub fn requires_selection(&self) -> bool {
        matches!(self, Self::Selection | Self::SelectionAndSiblings)
    }
}

/// Resolve a scope against a snapshot into candidate paths, ordered by
/// canonical path. Directories are never candidates.
///
/// An empty result from a selection-anchored scope means there is nothing
/// to build; callers must not treat it as an empty successful context.
pub fn resolve_scope(snapshot: &WorkspaceSnapshot, scope: ContextScope) -> Vec<PathBuf> {
    match scope {
        ContextScope::Selection => snapshot
            .selected()
            .filter(|d| d.is_file())
            .map(|d| vec![d.path.clone()])
            .unwrap_or_default(),
        ContextScope::SelectionAndSiblings => {
            let Some(selected) = snapshot.selected().filter(|d| d.is_file()) else {
                return Vec::new();
            };
            let parent = selected.path.parent();
            snapshot
                .files()
                .filter(|d| d.path.parent() == parent)
                .map(|d| d.path.clone())
                .collect()
        }
        ContextScope::Workspace => snapshot.files().map(|d| d.path.clone()).collect(),
        ContextScope::Manual => snapshot
            .files()
            .filter(|d| {
                snapshot.inclusion.get(&d.id).copied().unwrap_or_default()
                    == ContextInclusionState::Included
            })
            .map(|d| d.path.clone())
            .collect(),
    }
}
