//! Error types for workspace context assembly.

use thiserror::Error;

/// Result type alias for context assembly operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate.
///
/// Only structural failures surface here. Per-file load failures and budget
/// exclusions are absorbed into [`crate::types::ContextBuildResult`].
#[derive(Error, Debug)]
pub enum Error {
    // ===== Workspace Errors =====
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Workspace root unreadable: {path} ({message})")]
    RootUnreadable { path: String, message: String },

    #[error("Cannot enumerate directory: {path} ({message})")]
    Enumeration { path: String, message: String },

    #[error("No workspace is open")]
    NoWorkspace,

    // ===== File Errors =====
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("File is not valid UTF-8: {0}")]
    NotUtf8(String),

    // ===== Collaborator Errors =====
    #[error("Mutation denied: {0}")]
    MutationDenied(String),

    #[error("Assistant error: {0}")]
    Assistant(String),

    // ===== I/O Errors =====
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ===== Internal Errors =====
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cancelled: operation was cancelled")]
    Cancelled,
}

impl Error {
    /// Create a root-unreadable error from a path and its underlying cause.
    pub fn root_unreadable(path: impl AsRef<std::path::Path>, cause: impl ToString) -> Self {
        Self::RootUnreadable {
            path: path.as_ref().display().to_string(),
            message: cause.to_string(),
        }
    }

    /// Create an enumeration error for a directory that could not be listed.
    pub fn enumeration(path: impl AsRef<std::path::Path>, cause: impl ToString) -> Self {
        Self::Enumeration {
            path: path.as_ref().display().to_string(),
            message: cause.to_string(),
        }
    }

    /// Structural failures abort a snapshot build as a whole.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::WorkspaceNotFound(_)
                | Self::RootUnreadable { .. }
                | Self::Enumeration { .. }
                | Self::NoWorkspace
        )
    }

    /// Check if this error represents a cancelled build.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::root_unreadable("/tmp/missing", "No such file or directory");
        assert_eq!(
            err.to_string(),
            "Workspace root unreadable: /tmp/missing (No such file or directory)"
        );

        let err = Error::enumeration("/tmp/ws/src", "Permission denied");
        assert_eq!(
            err.to_string(),
            "Cannot enumerate directory: /tmp/ws/src (Permission denied)"
        );

        let err = Error::NotUtf8("/tmp/ws/logo.png".to_string());
        assert_eq!(err.to_string(), "File is not valid UTF-8: /tmp/ws/logo.png");
    }

    #[test]
    fn test_error_is_structural() {
        assert!(Error::root_unreadable("/x", "gone").is_structural());
        assert!(Error::enumeration("/x", "denied").is_structural());
        assert!(Error::NoWorkspace.is_structural());

        assert!(!Error::FileNotFound("a.rs".to_string()).is_structural());
        assert!(!Error::Cancelled.is_structural());
    }

    #[test]
    fn test_cancelled() {
        let cancelled = Error::Cancelled;
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.to_string(), "Cancelled: operation was cancelled");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("IO error"));
    }
}
