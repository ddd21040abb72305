//! Core type definitions for workspace context assembly.
//!
//! This module contains the shared types passed between pipeline stages,
//! organized into sub-modules for the workspace tree and the context build.

pub mod context;
pub mod workspace;

// Re-export commonly used types
pub use context::*;
pub use workspace::*;
