//! Boundary filter deciding which tree entries are ever eligible.

use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{Error, Result};

/// Path components that never enter a snapshot.
pub const DEFAULT_EXCLUDED_COMPONENTS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".build",
    ".swiftpm",
    "DerivedData",
    "Pods",
    "node_modules",
    "target",
    "dist",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".venv",
    ".idea",
    ".DS_Store",
];

/// Pure filter over path components and optional glob patterns.
#[derive(Debug, Clone)]
pub struct BoundaryFilter {
    components: HashSet<String>,
    patterns: Vec<Pattern>,
}

impl BoundaryFilter {
    /// Filter with the default exclusion set.
    pub fn new() -> Self {
        Self {
            components: DEFAULT_EXCLUDED_COMPONENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            patterns: Vec::new(),
        }
    }

    /// Add component names to exclude.
    pub fn with_components(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.components.extend(names);
        self
    }

    /// Add glob patterns matched against root-relative paths.
    pub fn with_patterns(mut self, patterns: &[String]) -> Result<Self> {
        for raw in patterns {
            let pattern = Pattern::new(raw)
                .map_err(|e| Error::Config(format!("invalid exclude pattern '{}': {}", raw, e)))?;
            self.patterns.push(pattern);
        }
        Ok(self)
    }

    /// Check a path. No I/O; only the path string is inspected.
    pub fn allows(&self, path: &Path) -> bool {
        let excluded_component = path
            .components()
            .any(|c| self.components.contains(c.as_os_str().to_string_lossy().as_ref()));
        if excluded_component {
            return false;
        }

        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        !self
            .patterns
            .iter()
            .any(|p| p.matches_path_with(path, options))
    }

    /// Check a path below `root`, ignoring the components of `root` itself.
    pub fn allows_within(&self, root: &Path, path: &Path) -> bool {
        match path.strip_prefix(root) {
            Ok(relative) => self.allows(relative),
            Err(_) => self.allows(path),
        }
    }
}

impl Default for BoundaryFilter {
    fn default() -> Self {
        Self::new()
    }
}
