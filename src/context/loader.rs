//! File loading for context candidates.
//!
//! Each candidate is read independently; a failure is recorded and the file
//! is dropped without affecting the others.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Error, Result};
use crate::types::{relative_display, LoadFailure, LoadedFile};
use crate::workspace::fs::{FileSystemAccess, InMemoryFileSystem, LocalFileSystem};

/// Default number of concurrent reads.
pub const DEFAULT_MAX_CONCURRENT_READS: usize = 16;

/// Reads the raw bytes of one candidate.
#[async_trait]
pub trait FileLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Vec<u8>>;
}

#[async_trait]
impl FileLoader for LocalFileSystem {
    async fn load(&self, path: &Path) -> Result<Vec<u8>> {
        self.read(path).await
    }
}

#[async_trait]
impl FileLoader for InMemoryFileSystem {
    async fn load(&self, path: &Path) -> Result<Vec<u8>> {
        self.read(path).await
    }
}

/// Successful loads and per-file failures, both in candidate order.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<LoadedFile>,
    pub failures: Vec<LoadFailure>,
}

/// Load every candidate, at most `max_concurrent` at a time.
///
/// Results keep candidate order regardless of completion order, and the
/// call only returns once every read has finished.
pub async fn load_all(
    loader: &dyn FileLoader,
    root: &Path,
    candidates: &[PathBuf],
    max_concurrent: usize,
) -> LoadReport {
    let reads: Vec<_> = candidates
        .iter()
        .map(|path| async move { (path, loader.load(path).await) })
        .collect();
    let results: Vec<(&PathBuf, Result<Vec<u8>>)> = stream::iter(reads)
        .buffered(max_concurrent.max(1))
        .collect()
        .await;

    let mut report = LoadReport::default();
    for (path, result) in results {
        let relative_path = relative_display(root, path);
        let decoded = result.and_then(|bytes| {
            String::from_utf8(bytes).map_err(|_| Error::NotUtf8(path.display().to_string()))
        });
        match decoded {
            Ok(contents) => report.loaded.push(LoadedFile {
                path: path.clone(),
                relative_path,
                contents,
            }),
            Err(e) => {
                warn!("Skipping unreadable file {}: {}", relative_path, e);
                report.failures.push(LoadFailure {
                    path: path.clone(),
                    relative_path,
                    message: e.to_string(),
                });
            }
        }
    }
    report
}
