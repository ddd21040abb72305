//! Persisted per-project inclusion preferences.
//!
//! A JSON document mapping canonical paths to `included` / `excluded`.
//! Neutral paths are simply absent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{ContextInclusionState, FileId};

/// Current on-disk format version.
const PREFERENCES_VERSION: u32 = 1;

/// User overrides keyed by canonical path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionPreferences {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub entries: BTreeMap<PathBuf, ContextInclusionState>,
    /// RFC 3339 time of the last change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn default_version() -> u32 {
    PREFERENCES_VERSION
}

impl InclusionPreferences {
    pub fn new() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            entries: BTreeMap::new(),
            updated_at: None,
        }
    }

    /// Default storage location for a workspace root.
    pub fn default_path(root: &Path) -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join("workspace-context")
                .join("preferences")
                .join(format!("{}.json", FileId::for_path(root)))
        })
    }

    /// Load preferences; a missing or corrupt file yields empty preferences.
    pub async fn load(path: &Path) -> Result<Self> {
        if !fs::try_exists(path).await? {
            debug!("No preferences at {:?}", path);
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path).await?;
        match serde_json::from_str(&content) {
            Ok(prefs) => Ok(prefs),
            Err(e) => {
                warn!("Ignoring unreadable preferences {:?}: {}", path, e);
                Ok(Self::new())
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Record a state. `Neutral` removes the override.
    pub fn set(&mut self, path: impl Into<PathBuf>, state: ContextInclusionState) {
        let path = path.into();
        match state {
            ContextInclusionState::Neutral => {
                self.entries.remove(&path);
            }
            _ => {
                self.entries.insert(path, state);
            }
        }
        self.updated_at = Some(chrono::Utc::now().to_rfc3339());
    }

    pub fn state_for(&self, path: &Path) -> ContextInclusionState {
        self.entries.get(path).copied().unwrap_or_default()
    }
}
