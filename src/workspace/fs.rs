//! File system access capability.
//!
//! The snapshot builder and file loader only see the workspace through
//! [`FileSystemAccess`]. [`LocalFileSystem`] talks to the real disk;
//! [`InMemoryFileSystem`] backs tests and supports injected failures.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncReadExt;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::DescriptorKind;

/// Read buffer size for streamed hashing.
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: DescriptorKind,
}

/// Metadata for a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata {
    pub kind: DescriptorKind,
    pub size: u64,
}

/// Read-only view of a file tree.
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Canonicalize a workspace root, failing if it is not a readable directory.
    async fn resolve_root(&self, path: &Path) -> Result<PathBuf>;

    /// List the direct children of a directory, sorted by name.
    async fn list_children(&self, dir: &Path) -> Result<Vec<DirEntry>>;

    async fn metadata(&self, path: &Path) -> Result<EntryMetadata>;

    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// SHA-256 hex digest of a file's contents.
    async fn hash_contents(&self, path: &Path) -> Result<String>;
}

fn io_error(path: &Path, e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound(path.display().to_string()),
        _ => Error::Io(e),
    }
}

/// Production access backed by the local disk.
///
/// Symbolic links are not followed, so every listed path stays canonical.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystemAccess for LocalFileSystem {
    async fn resolve_root(&self, path: &Path) -> Result<PathBuf> {
        let canonical = fs::canonicalize(path)
            .await
            .map_err(|e| Error::root_unreadable(path, e))?;
        let meta = fs::metadata(&canonical)
            .await
            .map_err(|e| Error::root_unreadable(&canonical, e))?;
        if !meta.is_dir() {
            return Err(Error::WorkspaceNotFound(canonical.display().to_string()));
        }
        Ok(canonical)
    }

    async fn list_children(&self, dir: &Path) -> Result<Vec<DirEntry>> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<Vec<DirEntry>> {
            let mut entries = Vec::new();
            let walker = WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .follow_links(false)
                .sort_by_file_name();

            for entry in walker {
                let entry = entry.map_err(|e| Error::enumeration(&dir, e))?;
                let file_type = entry.file_type();
                let kind = if file_type.is_dir() {
                    DescriptorKind::Directory
                } else if file_type.is_file() {
                    DescriptorKind::File
                } else {
                    continue;
                };
                entries.push(DirEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path: entry.into_path(),
                    kind,
                });
            }
            Ok(entries)
        })
        .await
        .map_err(|e| Error::Internal(format!("directory listing task failed: {}", e)))?
    }

    async fn metadata(&self, path: &Path) -> Result<EntryMetadata> {
        let meta = fs::symlink_metadata(path)
            .await
            .map_err(|e| io_error(path, e))?;
        let kind = if meta.is_dir() {
            DescriptorKind::Directory
        } else {
            DescriptorKind::File
        };
        Ok(EntryMetadata {
            kind,
            size: meta.len(),
        })
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).await.map_err(|e| io_error(path, e))
    }

    async fn hash_contents(&self, path: &Path) -> Result<String> {
        let mut file = fs::File::open(path).await.map_err(|e| io_error(path, e))?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; HASH_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await.map_err(|e| io_error(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

/// In-memory tree for tests.
///
/// Paths are used as given, so callers should build the tree from absolute
/// paths. Ancestor directories are created implicitly.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileSystem {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    unreadable: HashSet<PathBuf>,
    unlistable: HashSet<PathBuf>,
    reads: Arc<AtomicUsize>,
}

impl InMemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file and its ancestors.
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        self.add_ancestors(&path);
        self.files.insert(path, contents.into());
        self
    }

    /// Add an (empty) directory and its ancestors.
    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.add_ancestors(&path);
        self.dirs.insert(path);
        self
    }

    /// Make reads of `path` fail.
    pub fn with_unreadable(mut self, path: impl Into<PathBuf>) -> Self {
        self.unreadable.insert(path.into());
        self
    }

    /// Make listing of directory `path` fail.
    pub fn with_unlistable(mut self, path: impl Into<PathBuf>) -> Self {
        self.unlistable.insert(path.into());
        self
    }

    /// Number of `read` calls served so far, across clones.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn add_ancestors(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }

    fn name_of(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FileSystemAccess for InMemoryFileSystem {
    async fn resolve_root(&self, path: &Path) -> Result<PathBuf> {
        if self.unlistable.contains(path) {
            return Err(Error::root_unreadable(path, "permission denied"));
        }
        if self.dirs.contains(path) {
            Ok(path.to_path_buf())
        } else if self.files.contains_key(path) {
            Err(Error::WorkspaceNotFound(path.display().to_string()))
        } else {
            Err(Error::root_unreadable(path, "no such directory"))
        }
    }

    async fn list_children(&self, dir: &Path) -> Result<Vec<DirEntry>> {
        if self.unlistable.contains(dir) {
            return Err(Error::enumeration(dir, "permission denied"));
        }
        if !self.dirs.contains(dir) {
            return Err(Error::enumeration(dir, "no such directory"));
        }

        let dirs = self
            .dirs
            .iter()
            .filter(|p| p.parent() == Some(dir))
            .map(|p| DirEntry {
                name: Self::name_of(p),
                path: p.clone(),
                kind: DescriptorKind::Directory,
            });
        let files = self
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .map(|p| DirEntry {
                name: Self::name_of(p),
                path: p.clone(),
                kind: DescriptorKind::File,
            });

        let mut entries: Vec<DirEntry> = dirs.chain(files).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn metadata(&self, path: &Path) -> Result<EntryMetadata> {
        if let Some(contents) = self.files.get(path) {
            return Ok(EntryMetadata {
                kind: DescriptorKind::File,
                size: contents.len() as u64,
            });
        }
        if self.dirs.contains(path) {
            return Ok(EntryMetadata {
                kind: DescriptorKind::Directory,
                size: 0,
            });
        }
        Err(Error::FileNotFound(path.display().to_string()))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.unreadable.contains(path) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("permission denied: {}", path.display()),
            )));
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::FileNotFound(path.display().to_string()))
    }

    async fn hash_contents(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path).await?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_listing_is_sorted_by_name() {
        let fs = InMemoryFileSystem::new()
            .with_file("/ws/src/b.rs", "b")
            .with_file("/ws/src/a.rs", "a")
            .with_dir("/ws/src/sub");

        let children = fs.list_children(Path::new("/ws/src")).await.unwrap();
        let names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a.rs", "b.rs", "sub"]);
        assert_eq!(children[2].kind, DescriptorKind::Directory);
    }

    #[tokio::test]
    async fn test_in_memory_failures() {
        let fs = InMemoryFileSystem::new()
            .with_file("/ws/a.rs", "a")
            .with_unreadable("/ws/a.rs")
            .with_unlistable("/ws");

        assert!(fs.read(Path::new("/ws/a.rs")).await.is_err());
        assert!(fs.list_children(Path::new("/ws")).await.is_err());
        assert!(fs.resolve_root(Path::new("/ws")).await.is_err());
        assert_eq!(fs.read_count(), 1);
    }

    #[tokio::test]
    async fn test_local_resolve_root_and_list() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("README.md"), "# hi").unwrap();

        let fs = LocalFileSystem::new();
        let root = fs.resolve_root(dir.path()).await.unwrap();
        let children = fs.list_children(&root).await.unwrap();
        let names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["README.md", "src"]);

        let meta = fs.metadata(&root.join("src/main.rs")).await.unwrap();
        assert_eq!(meta.kind, DescriptorKind::File);
        assert_eq!(meta.size, 12);
    }

    #[tokio::test]
    async fn test_local_resolve_root_missing() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        let err = LocalFileSystem::new().resolve_root(&missing).await.unwrap_err();
        assert!(err.is_structural());
    }

    #[tokio::test]
    async fn test_local_hash_spans_several_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.bin");
        let contents: Vec<u8> = (0..HASH_CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &contents).unwrap();

        let mut hasher = Sha256::new();
        hasher.update(&contents);
        let expected = hex::encode(hasher.finalize());

        let fs = LocalFileSystem::new();
        assert_eq!(fs.hash_contents(&path).await.unwrap(), expected);
        assert_eq!(fs.metadata(&path).await.unwrap().size, contents.len() as u64);
    }

    #[tokio::test]
    async fn test_local_hash_not_found() {
        let dir = TempDir::new().unwrap();
        let err = LocalFileSystem::new()
            .hash_contents(&dir.path().join("nope.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_local_read_not_found() {
        let dir = TempDir::new().unwrap();
        let err = LocalFileSystem::new()
            .read(&dir.path().join("nope.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
