use crate::error::{GuideError, Result};
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

const HISTORY_LIMIT: usize = 200;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveModule {
    pub category: String,
    pub module: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub module: String,
    /// What the learner did: `start`, `command`, `select`, `complete`, `goto`, `quiz`.
    pub action: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// CLI session state persisted between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<ActiveModule>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    pub fn new() -> Self {
        Self {
            version: 1,
            active: None,
            history: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::state_path(root);
        if !path.exists() {
            return Err(GuideError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let state: State = serde_yaml::from_str(&data)?;
        Ok(state)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::state_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub fn set_active(&mut self, category: &str, module: &str) {
        let unchanged = self
            .active
            .as_ref()
            .is_some_and(|a| a.category == category && a.module == module);
        if !unchanged {
            self.active = Some(ActiveModule {
                category: category.to_string(),
                module: module.to_string(),
                started_at: Utc::now(),
            });
        }
        self.last_updated = Utc::now();
    }

    pub fn clear_active(&mut self) {
        self.active = None;
        self.last_updated = Utc::now();
    }

    /// The active `(category, module)` pair.
    pub fn require_active(&self) -> Result<(&str, &str)> {
        self.active
            .as_ref()
            .map(|a| (a.category.as_str(), a.module.as_str()))
            .ok_or(GuideError::NoActiveModule)
    }

    pub fn record(&mut self, module: &str, action: &str, detail: &str) {
        self.history.push(HistoryEntry {
            module: module.to_string(),
            action: action.to_string(),
            detail: detail.to_string(),
            timestamp: Utc::now(),
        });
        if self.history.len() > HISTORY_LIMIT {
            self.history.drain(..self.history.len() - HISTORY_LIMIT);
        }
        self.last_updated = Utc::now();
    }

    pub fn last_action(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
