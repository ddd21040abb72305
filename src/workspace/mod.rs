//! Workspace layer: what the tree looks like and which files are in scope.
//!
//! - `boundary` - Component/glob exclusion applied before any descriptor exists
//! - `fs` - File system capability (local disk and in-memory)
//! - `language` - Language tags from extensions and filenames
//! - `preferences` - Persisted per-path inclusion overrides
//! - `scope` - Scope resolution into candidate paths
//! - `snapshot` - Deterministic snapshot building

pub mod boundary;
pub mod fs;
pub mod language;
pub mod preferences;
pub mod scope;
pub mod snapshot;

pub use boundary::BoundaryFilter;
pub use fs::{FileSystemAccess, InMemoryFileSystem, LocalFileSystem};
pub use preferences::InclusionPreferences;
pub use scope::resolve_scope;
pub use snapshot::SnapshotBuilder;
