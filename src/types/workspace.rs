//! Workspace tree types: descriptors, inclusion states and snapshots.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Number of hex characters kept from the path digest.
const FILE_ID_LEN: usize = 16;

/// Stable, opaque identifier of a tree entry.
///
/// Derived from the canonical path alone, so rescanning an unchanged tree
/// reproduces the same identifiers regardless of scan order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Derive the identifier for a canonical path.
    pub fn for_path(path: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(path.to_string_lossy().as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(digest[..FILE_ID_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    File,
    Directory,
}

/// One file or directory in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Stable identifier
    pub id: FileId,
    /// Display name (last path component)
    pub name: String,
    /// File or directory
    pub kind: DescriptorKind,
    /// Child identifiers ordered by name (directories only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileId>,
    /// Canonical absolute path
    pub path: PathBuf,
    /// Language tag (files only, when known)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Size in bytes (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// SHA-256 of the file contents (files only, when readable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl FileDescriptor {
    pub fn is_file(&self) -> bool {
        self.kind == DescriptorKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == DescriptorKind::Directory
    }
}

/// Per-file user override for context inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextInclusionState {
    /// Forced in by the user
    Included,
    /// Forced out by the user
    Excluded,
    /// Scope decides
    #[default]
    Neutral,
}

/// Rule deciding which files are candidates for context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ContextScope {
    /// Only the selected file
    #[default]
    Selection,
    /// The selected file and every file in the same directory
    SelectionAndSiblings,
    /// Every file in the workspace
    Workspace,
    /// Exactly the files marked as included
    Manual,
}

/// Immutable view of the workspace tree produced by one scan.
///
/// Snapshots are never edited in place: selection and inclusion changes go
/// through [`WorkspaceSnapshot::with_selection`] and
/// [`WorkspaceSnapshot::with_inclusion`], which return new values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    /// Canonical workspace root
    pub root: PathBuf,
    /// Currently selected path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_path: Option<PathBuf>,
    /// Identifier of the selected path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_id: Option<FileId>,
    /// Identifier to canonical path
    pub paths: BTreeMap<FileId, PathBuf>,
    /// Identifier to inclusion state
    pub inclusion: BTreeMap<FileId, ContextInclusionState>,
    /// All descriptors, ordered by canonical path
    pub descriptors: Vec<FileDescriptor>,
    /// Hash over the sorted `path:id` pairs
    pub snapshot_hash: String,
}

impl WorkspaceSnapshot {
    /// Look up a descriptor by identifier.
    pub fn descriptor(&self, id: &FileId) -> Option<&FileDescriptor> {
        let path = self.paths.get(id)?;
        self.descriptor_for_path(path)
    }

    /// Look up a descriptor by canonical path.
    pub fn descriptor_for_path(&self, path: &Path) -> Option<&FileDescriptor> {
        self.descriptors
            .binary_search_by(|d| d.path.as_path().cmp(path))
            .ok()
            .map(|idx| &self.descriptors[idx])
    }

    /// Iterate over file descriptors in path order.
    pub fn files(&self) -> impl Iterator<Item = &FileDescriptor> {
        self.descriptors.iter().filter(|d| d.is_file())
    }

    pub fn file_count(&self) -> usize {
        self.files().count()
    }

    /// The selected descriptor, if the selection still exists.
    pub fn selected(&self) -> Option<&FileDescriptor> {
        self.selected_id.as_ref().and_then(|id| self.descriptor(id))
    }

    /// Inclusion state for a path (`Neutral` when unknown).
    pub fn inclusion_state(&self, path: &Path) -> ContextInclusionState {
        let id = FileId::for_path(path);
        self.inclusion.get(&id).copied().unwrap_or_default()
    }

    /// Path relative to the root, `/`-separated, for display and prompts.
    pub fn relative_path(&self, path: &Path) -> String {
        relative_display(&self.root, path)
    }

    /// Resolve a user-supplied path (absolute or root-relative) to a known
    /// canonical path in this snapshot.
    pub fn resolve_path(&self, path: &Path) -> Option<PathBuf> {
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        self.descriptor_for_path(&candidate).map(|d| d.path.clone())
    }

    /// Return a copy with a new selection. Unknown paths clear the selection.
    pub fn with_selection(&self, path: Option<&Path>) -> Self {
        let mut next = self.clone();
        match path.and_then(|p| self.resolve_path(p)) {
            Some(resolved) => {
                next.selected_id = Some(FileId::for_path(&resolved));
                next.selected_path = Some(resolved);
            }
            None => {
                next.selected_id = None;
                next.selected_path = None;
            }
        }
        next
    }

    /// Return a copy with one path's inclusion state replaced.
    ///
    /// Returns `None` when the path is not part of this snapshot.
    pub fn with_inclusion(&self, path: &Path, state: ContextInclusionState) -> Option<Self> {
        let resolved = self.resolve_path(path)?;
        let mut next = self.clone();
        next.inclusion.insert(FileId::for_path(&resolved), state);
        Some(next)
    }
}

/// Render `path` relative to `root` with `/` separators.
pub fn relative_display(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(path: &str, kind: DescriptorKind) -> FileDescriptor {
        let path = PathBuf::from(path);
        FileDescriptor {
            id: FileId::for_path(&path),
            name: path.file_name().unwrap().to_string_lossy().to_string(),
            kind,
            children: Vec::new(),
            path,
            language: None,
            size: None,
            content_hash: None,
        }
    }

    fn sample() -> WorkspaceSnapshot {
        let descriptors = vec![
            descriptor("/ws/src", DescriptorKind::Directory),
            descriptor("/ws/src/a.rs", DescriptorKind::File),
            descriptor("/ws/src/b.rs", DescriptorKind::File),
        ];
        WorkspaceSnapshot {
            root: PathBuf::from("/ws"),
            selected_path: None,
            selected_id: None,
            paths: descriptors
                .iter()
                .map(|d| (d.id.clone(), d.path.clone()))
                .collect(),
            inclusion: descriptors
                .iter()
                .map(|d| (d.id.clone(), ContextInclusionState::Neutral))
                .collect(),
            descriptors,
            snapshot_hash: "hash".to_string(),
        }
    }

    #[test]
    fn test_file_id_depends_only_on_path() {
        let a = FileId::for_path(Path::new("/ws/src/a.rs"));
        let b = FileId::for_path(Path::new("/ws/src/a.rs"));
        let c = FileId::for_path(Path::new("/ws/src/b.rs"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), FILE_ID_LEN);
    }

    #[test]
    fn test_with_selection_resolves_relative_paths() {
        let snapshot = sample();
        let selected = snapshot.with_selection(Some(Path::new("src/a.rs")));

        assert_eq!(selected.selected_path, Some(PathBuf::from("/ws/src/a.rs")));
        assert_eq!(selected.selected().map(|d| d.name.as_str()), Some("a.rs"));
        // Original is untouched
        assert!(snapshot.selected_path.is_none());
    }

    #[test]
    fn test_with_selection_unknown_clears() {
        let snapshot = sample().with_selection(Some(Path::new("src/a.rs")));
        let cleared = snapshot.with_selection(Some(Path::new("src/gone.rs")));

        assert!(cleared.selected_path.is_none());
        assert!(cleared.selected_id.is_none());
    }

    #[test]
    fn test_with_inclusion() {
        let snapshot = sample();
        let next = snapshot
            .with_inclusion(Path::new("/ws/src/b.rs"), ContextInclusionState::Included)
            .unwrap();

        assert_eq!(
            next.inclusion_state(Path::new("/ws/src/b.rs")),
            ContextInclusionState::Included
        );
        assert_eq!(
            snapshot.inclusion_state(Path::new("/ws/src/b.rs")),
            ContextInclusionState::Neutral
        );
        assert!(snapshot
            .with_inclusion(Path::new("nope.rs"), ContextInclusionState::Included)
            .is_none());
    }

    #[test]
    fn test_relative_display() {
        assert_eq!(
            relative_display(Path::new("/ws"), Path::new("/ws/src/sub/c.rs")),
            "src/sub/c.rs"
        );
    }

    #[test]
    fn test_scope_serialization() {
        let json = serde_json::to_string(&ContextScope::SelectionAndSiblings).unwrap();
        assert_eq!(json, "\"selection_and_siblings\"");
    }
}
