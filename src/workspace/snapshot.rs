//! Workspace snapshot builder.
//!
//! Walks the filtered tree through [`FileSystemAccess`] and produces an
//! immutable [`WorkspaceSnapshot`]. Two builds of an identical tree yield the
//! same descriptor order and the same `snapshot_hash`.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::types::{DescriptorKind, FileDescriptor, FileId, WorkspaceSnapshot};
use crate::workspace::boundary::BoundaryFilter;
use crate::workspace::fs::FileSystemAccess;
use crate::workspace::language::language_for_path;
use crate::workspace::preferences::InclusionPreferences;

/// Builds snapshots from a file system capability and a boundary filter.
#[derive(Clone)]
pub struct SnapshotBuilder {
    fs: Arc<dyn FileSystemAccess>,
    filter: BoundaryFilter,
}

impl SnapshotBuilder {
    pub fn new(fs: Arc<dyn FileSystemAccess>, filter: BoundaryFilter) -> Self {
        Self { fs, filter }
    }

    pub fn filter(&self) -> &BoundaryFilter {
        &self.filter
    }

    /// Scan `root` and build a snapshot.
    ///
    /// Any enumeration failure aborts the whole build. A file whose bytes
    /// cannot be read still gets a descriptor, just without a content hash.
    pub async fn build(
        &self,
        root: &Path,
        previous_selection: Option<&Path>,
        preferences: &InclusionPreferences,
    ) -> Result<WorkspaceSnapshot> {
        let root = self.fs.resolve_root(root).await?;
        let mut descriptors: Vec<FileDescriptor> = Vec::new();
        let mut dirs_to_visit = vec![root.clone()];

        while let Some(current_dir) = dirs_to_visit.pop() {
            let mut entries = self.fs.list_children(&current_dir).await?;
            entries.retain(|entry| {
                let allowed = self.filter.allows_within(&root, &entry.path);
                if !allowed {
                    debug!("Outside boundary: {:?}", entry.path);
                }
                allowed
            });
            entries.sort_by(|a, b| a.name.cmp(&b.name));

            let children = entries.iter().map(|e| FileId::for_path(&e.path)).collect();
            descriptors.push(directory_descriptor(&current_dir, children));

            for entry in entries {
                match entry.kind {
                    DescriptorKind::Directory => dirs_to_visit.push(entry.path),
                    DescriptorKind::File => {
                        descriptors.push(self.file_descriptor(entry.name, entry.path).await)
                    }
                }
            }
        }

        descriptors.sort_by(|a, b| a.path.cmp(&b.path));
        let snapshot_hash = compute_snapshot_hash(&descriptors);

        let paths: BTreeMap<FileId, PathBuf> = descriptors
            .iter()
            .map(|d| (d.id.clone(), d.path.clone()))
            .collect();
        let mut snapshot = WorkspaceSnapshot {
            root,
            selected_path: None,
            selected_id: None,
            paths,
            inclusion: BTreeMap::new(),
            descriptors,
            snapshot_hash,
        };
        apply_preferences(&mut snapshot, preferences);

        let snapshot = match previous_selection {
            Some(selection) => {
                let next = snapshot.with_selection(Some(selection));
                if next.selected_path.is_none() {
                    info!("Previous selection {:?} no longer exists, clearing", selection);
                }
                next
            }
            None => snapshot,
        };

        info!(
            "Snapshot built for {:?}: {} entries, {} files, hash {}",
            snapshot.root,
            snapshot.descriptors.len(),
            snapshot.file_count(),
            &snapshot.snapshot_hash[..12]
        );
        Ok(snapshot)
    }

    async fn file_descriptor(&self, name: String, path: PathBuf) -> FileDescriptor {
        let size = match self.fs.metadata(&path).await {
            Ok(meta) => Some(meta.size),
            Err(e) => {
                debug!("No metadata for {:?}: {}", path, e);
                None
            }
        };
        let content_hash = match self.fs.hash_contents(&path).await {
            Ok(hash) => Some(hash),
            Err(e) => {
                debug!("Cannot hash {:?}: {}", path, e);
                None
            }
        };

        FileDescriptor {
            id: FileId::for_path(&path),
            name,
            kind: DescriptorKind::File,
            children: Vec::new(),
            language: language_for_path(&path).map(str::to_string),
            size,
            content_hash,
            path,
        }
    }
}

fn directory_descriptor(path: &Path, children: Vec<FileId>) -> FileDescriptor {
    FileDescriptor {
        id: FileId::for_path(path),
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        kind: DescriptorKind::Directory,
        children,
        path: path.to_path_buf(),
        language: None,
        size: None,
        content_hash: None,
    }
}

/// Reset every descriptor's inclusion state from `preferences`.
pub fn apply_preferences(snapshot: &mut WorkspaceSnapshot, preferences: &InclusionPreferences) {
    snapshot.inclusion = snapshot
        .descriptors
        .iter()
        .map(|d| (d.id.clone(), preferences.state_for(&d.path)))
        .collect();
}

/// SHA-256 hex digest of file contents.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash over the sorted `path:id` pairs of all descriptors.
pub fn compute_snapshot_hash(descriptors: &[FileDescriptor]) -> String {
    let mut pairs: Vec<(&Path, &FileId)> = descriptors
        .iter()
        .map(|d| (d.path.as_path(), &d.id))
        .collect();
    pairs.sort();

    let mut hasher = Sha256::new();
    for (path, id) in pairs {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(b":");
        hasher.update(id.as_str().as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::ContextInclusionState;
    use crate::workspace::fs::InMemoryFileSystem;

    fn tree() -> InMemoryFileSystem {
        InMemoryFileSystem::new()
            .with_file("/ws/src/b.swift", "let b = 2")
            .with_file("/ws/src/a.swift", "let a = 1")
            .with_file("/ws/src/sub/c.swift", "let c = 3")
            .with_file("/ws/.git/HEAD", "ref: refs/heads/main")
            .with_file("/ws/.build/debug/out.o", "binary")
            .with_file("/ws/README.md", "# ws")
    }

    fn builder(fs: InMemoryFileSystem) -> SnapshotBuilder {
        SnapshotBuilder::new(Arc::new(fs), BoundaryFilter::new())
    }

    #[tokio::test]
    async fn test_build_is_deterministic() {
        let prefs = InclusionPreferences::new();
        let first = builder(tree()).build(Path::new("/ws"), None, &prefs).await.unwrap();
        let second = builder(tree()).build(Path::new("/ws"), None, &prefs).await.unwrap();

        assert_eq!(first.snapshot_hash, second.snapshot_hash);
        let first_paths: Vec<_> = first.descriptors.iter().map(|d| &d.path).collect();
        let second_paths: Vec<_> = second.descriptors.iter().map(|d| &d.path).collect();
        assert_eq!(first_paths, second_paths);

        let mut sorted = first_paths.clone();
        sorted.sort();
        assert_eq!(first_paths, sorted);
    }

    #[tokio::test]
    async fn test_boundary_components_never_appear() {
        let snapshot = builder(tree())
            .build(Path::new("/ws"), None, &InclusionPreferences::new())
            .await
            .unwrap();

        for descriptor in &snapshot.descriptors {
            let path = descriptor.path.to_string_lossy();
            assert!(!path.contains(".git"), "{}", path);
            assert!(!path.contains(".build"), "{}", path);
        }
        assert_eq!(snapshot.file_count(), 4);
    }

    #[tokio::test]
    async fn test_descriptor_fields() {
        let snapshot = builder(tree())
            .build(Path::new("/ws"), None, &InclusionPreferences::new())
            .await
            .unwrap();

        let file = snapshot
            .descriptor_for_path(Path::new("/ws/src/a.swift"))
            .unwrap();
        assert_eq!(file.language.as_deref(), Some("swift"));
        assert_eq!(file.size, Some(9));
        assert_eq!(file.content_hash.as_deref(), Some(content_hash(b"let a = 1").as_str()));

        let dir = snapshot.descriptor_for_path(Path::new("/ws/src")).unwrap();
        assert!(dir.size.is_none());
        assert!(dir.content_hash.is_none());
        let child_names: Vec<_> = dir
            .children
            .iter()
            .map(|id| snapshot.descriptor(id).unwrap().name.clone())
            .collect();
        assert_eq!(child_names, vec!["a.swift", "b.swift", "sub"]);
    }

    #[tokio::test]
    async fn test_hash_changes_with_tree() {
        let prefs = InclusionPreferences::new();
        let before = builder(tree()).build(Path::new("/ws"), None, &prefs).await.unwrap();
        let after = builder(tree().with_file("/ws/src/d.swift", "let d = 4"))
            .build(Path::new("/ws"), None, &prefs)
            .await
            .unwrap();
        assert_ne!(before.snapshot_hash, after.snapshot_hash);
    }

    #[tokio::test]
    async fn test_previous_selection() {
        let prefs = InclusionPreferences::new();
        let kept = builder(tree())
            .build(Path::new("/ws"), Some(Path::new("/ws/src/a.swift")), &prefs)
            .await
            .unwrap();
        assert_eq!(kept.selected_path, Some(PathBuf::from("/ws/src/a.swift")));
        assert_eq!(
            kept.selected_id,
            Some(FileId::for_path(Path::new("/ws/src/a.swift")))
        );

        let cleared = builder(tree())
            .build(Path::new("/ws"), Some(Path::new("/ws/src/deleted.swift")), &prefs)
            .await
            .unwrap();
        assert!(cleared.selected_path.is_none());
        assert!(cleared.selected_id.is_none());
    }

    #[tokio::test]
    async fn test_preferences_seed_inclusion() {
        let mut prefs = InclusionPreferences::new();
        prefs.set("/ws/src/sub/c.swift", ContextInclusionState::Included);

        let snapshot = builder(tree())
            .build(Path::new("/ws"), None, &prefs)
            .await
            .unwrap();
        assert_eq!(
            snapshot.inclusion_state(Path::new("/ws/src/sub/c.swift")),
            ContextInclusionState::Included
        );
        assert_eq!(
            snapshot.inclusion_state(Path::new("/ws/src/a.swift")),
            ContextInclusionState::Neutral
        );
    }

    #[tokio::test]
    async fn test_unreadable_root_fails() {
        let fs = tree().with_unlistable("/ws");
        let result = builder(fs)
            .build(Path::new("/ws"), None, &InclusionPreferences::new())
            .await;
        assert!(matches!(result, Err(Error::RootUnreadable { .. })));
    }

    #[tokio::test]
    async fn test_unlistable_subdirectory_fails_atomically() {
        let fs = tree().with_unlistable("/ws/src/sub");
        let result = builder(fs)
            .build(Path::new("/ws"), None, &InclusionPreferences::new())
            .await;
        assert!(matches!(result, Err(Error::Enumeration { .. })));
    }

    #[tokio::test]
    async fn test_unreadable_file_keeps_descriptor() {
        let fs = tree().with_unreadable("/ws/src/b.swift");
        let snapshot = builder(fs)
            .build(Path::new("/ws"), None, &InclusionPreferences::new())
            .await
            .unwrap();

        let file = snapshot
            .descriptor_for_path(Path::new("/ws/src/b.swift"))
            .unwrap();
        assert!(file.content_hash.is_none());
        assert_eq!(file.size, Some(9));
    }
}
