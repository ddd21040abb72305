//! Collaborator capabilities around the context pipeline.
//!
//! [`AssistantClient`] is the messaging side: it receives the rendered
//! context and returns the assistant's messages. [`MutationAuthorizing`] is
//! the only capability able to write to the workspace. It is reached through
//! [`ChangeApplier`], which the session never holds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::WorkspaceSnapshot;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One message returned by the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: MessageRole,
    pub content: String,
}

impl AssistantMessage {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// What the messaging collaborator receives for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantRequest {
    pub conversation_id: String,
    pub build_id: Uuid,
    pub question: String,
    /// Question plus every segment, ready to send as one prompt
    pub prompt: String,
    /// Rendered segments in order
    pub segments: Vec<String>,
}

/// Model-querying client. Transport is the implementor's concern.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn send(&self, request: AssistantRequest) -> Result<Vec<AssistantMessage>>;
}

/// A file write proposed by the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedChange {
    pub path: PathBuf,
    pub contents: String,
}

/// Authority to apply changes to workspace files.
#[async_trait]
pub trait MutationAuthorizing: Send + Sync {
    async fn apply(&self, change: &ProposedChange) -> Result<()>;
}

/// Production authority that refuses every change.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlyAuthority;

#[async_trait]
impl MutationAuthorizing for ReadOnlyAuthority {
    async fn apply(&self, change: &ProposedChange) -> Result<()> {
        warn!("Refusing change to {:?}: workspace is read-only", change.path);
        Err(Error::MutationDenied(change.path.display().to_string()))
    }
}

/// Apply side of the workspace, kept apart from the session that asks.
///
/// Only changes to files present in the given snapshot reach the authority.
#[derive(Clone)]
pub struct ChangeApplier {
    authority: Arc<dyn MutationAuthorizing>,
}

impl ChangeApplier {
    pub fn new(authority: Arc<dyn MutationAuthorizing>) -> Self {
        Self { authority }
    }

    /// Apply a user-approved change to a file of `snapshot`.
    pub async fn apply(&self, snapshot: &WorkspaceSnapshot, change: &ProposedChange) -> Result<()> {
        let target = snapshot
            .resolve_path(&change.path)
            .filter(|path| snapshot.descriptor_for_path(path).is_some_and(|d| d.is_file()))
            .ok_or_else(|| Error::InvalidPath(change.path.display().to_string()))?;

        info!("Applying approved change to {}", snapshot.relative_path(&target));
        let change = ProposedChange {
            path: target,
            contents: change.contents.clone(),
        };
        self.authority.apply(&change).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DescriptorKind, FileDescriptor, FileId};
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAuthority {
        applied: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl MutationAuthorizing for RecordingAuthority {
        async fn apply(&self, change: &ProposedChange) -> Result<()> {
            self.applied.lock().unwrap().push(change.path.clone());
            Ok(())
        }
    }

    fn snapshot() -> WorkspaceSnapshot {
        let descriptors: Vec<FileDescriptor> = [
            ("/ws", DescriptorKind::Directory),
            ("/ws/src", DescriptorKind::Directory),
            ("/ws/src/a.swift", DescriptorKind::File),
        ]
        .into_iter()
        .map(|(path, kind)| {
            let path = PathBuf::from(path);
            FileDescriptor {
                id: FileId::for_path(&path),
                name: path.file_name().unwrap().to_string_lossy().into_owned(),
                kind,
                children: Vec::new(),
                path,
                language: None,
                size: None,
                content_hash: None,
            }
        })
        .collect();
        WorkspaceSnapshot {
            root: PathBuf::from("/ws"),
            selected_path: None,
            selected_id: None,
            paths: descriptors
                .iter()
                .map(|d| (d.id.clone(), d.path.clone()))
                .collect(),
            inclusion: BTreeMap::new(),
            descriptors,
            snapshot_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_change_applier_resolves_workspace_files() {
        let authority = Arc::new(RecordingAuthority::default());
        let applier = ChangeApplier::new(authority.clone());
        let change = ProposedChange {
            path: PathBuf::from("src/a.swift"),
            contents: "let a = 2".to_string(),
        };

        applier.apply(&snapshot(), &change).await.unwrap();
        assert_eq!(
            *authority.applied.lock().unwrap(),
            vec![PathBuf::from("/ws/src/a.swift")]
        );
    }

    #[tokio::test]
    async fn test_change_applier_rejects_unknown_paths() {
        let authority = Arc::new(RecordingAuthority::default());
        let applier = ChangeApplier::new(authority.clone());

        for path in ["/etc/passwd", "src", "src/new.swift"] {
            let change = ProposedChange {
                path: PathBuf::from(path),
                contents: String::new(),
            };
            let err = applier.apply(&snapshot(), &change).await.unwrap_err();
            assert!(matches!(err, Error::InvalidPath(_)), "{}", path);
        }
        assert!(authority.applied.lock().unwrap().is_empty());
        assert!(snapshot().resolve_path(Path::new("src/a.swift")).is_some());
    }

    #[tokio::test]
    async fn test_read_only_authority_denies() {
        let change = ProposedChange {
            path: PathBuf::from("/ws/src/a.swift"),
            contents: "let a = 2".to_string(),
        };
        let err = ReadOnlyAuthority.apply(&change).await.unwrap_err();
        assert_eq!(err.to_string(), "Mutation denied: /ws/src/a.swift");
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&AssistantMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
