//! Workspace Context - deterministic context assembly for AI coding assistants
//!
//! Scans a project tree, decides which files may be attached to a question,
//! and packs them into ordered, budget-bounded segments. The library never
//! writes to the workspace.
//!
//! # Architecture
//!
//! The crate is a pipeline over immutable snapshots:
//!
//! 1. **Workspace Layer** (`workspace`) - Boundary filter, file system access,
//!    snapshot building, scope resolution, inclusion preferences
//! 2. **Context Layer** (`context`) - Loading, encoding, budget enforcement,
//!    segmentation and prompt rendering
//! 3. **Session Layer** (`session`) - Current snapshot, per-conversation build
//!    supersession, and the ask flow
//! 4. **Collaborators** (`assistant`) - Messaging client and mutation authority
//!    capabilities
//!
//! # Guarantees
//!
//! - **Determinism**: identical trees give identical snapshot hashes and order
//! - **No split files**: a file lives in exactly one segment
//! - **Read-only**: the session holds no mutation authority; approved changes
//!   go through `assistant::ChangeApplier`

pub mod assistant;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod session;
pub mod types;
pub mod workspace;

pub use error::{Error, Result};

/// Crate version reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
