//! Free-plan workflow limit.
//!
//! Completions are recorded in a [`CompletionLedger`]; the gate compares the
//! learner's count against the plan's limit. On module completion the gate
//! records first and checks second, so the check always sees the completion
//! that triggered it.

use crate::error::{GuideError, Result};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// PlanTier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
        })
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "free" => Ok(PlanTier::Free),
            "pro" => Ok(PlanTier::Pro),
            other => Err(format!("unknown plan tier: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// CompletionLedger
// ---------------------------------------------------------------------------

pub trait CompletionLedger: Send + Sync {
    /// Record that `user_id` finished `workflow_id`. Returns `true` when the
    /// completion is new; recording the same pair again is a no-op.
    fn record(&self, user_id: &str, workflow_id: &str) -> Result<bool>;

    /// Distinct workflows `user_id` has completed.
    fn count(&self, user_id: &str) -> Result<usize>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CompletionEntry {
    user_id: String,
    workflow_id: String,
    completed_at: DateTime<Utc>,
}

/// Key: `user_id ++ 0x00 ++ workflow_id`
/// Value: JSON-encoded CompletionEntry
const COMPLETIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("completions");

fn completion_key(user_id: &str, workflow_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.len() + workflow_id.len() + 1);
    key.extend_from_slice(user_id.as_bytes());
    key.push(0);
    key.extend_from_slice(workflow_id.as_bytes());
    key
}

/// Half-open byte range covering every key of `user_id`.
fn user_range(user_id: &str) -> (Vec<u8>, Vec<u8>) {
    let mut lower = user_id.as_bytes().to_vec();
    lower.push(0);
    let mut upper = user_id.as_bytes().to_vec();
    upper.push(1);
    (lower, upper)
}

fn ledger_err(e: impl fmt::Display) -> GuideError {
    GuideError::Ledger(e.to_string())
}

/// Completion ledger persisted in a redb file.
pub struct RedbLedger {
    db: Database,
}

impl RedbLedger {
    /// Open or create the database at `path`, creating the table up front so
    /// reads never race its creation.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(ledger_err)?;
        let wt = db.begin_write().map_err(ledger_err)?;
        wt.open_table(COMPLETIONS).map_err(ledger_err)?;
        wt.commit().map_err(ledger_err)?;
        Ok(Self { db })
    }

    /// Workflows `user_id` has completed, in key order.
    pub fn workflows(&self, user_id: &str) -> Result<Vec<String>> {
        let (lower, upper) = user_range(user_id);
        let rt = self.db.begin_read().map_err(ledger_err)?;
        let table = rt.open_table(COMPLETIONS).map_err(ledger_err)?;
        let mut out = Vec::new();
        for entry in table
            .range(lower.as_slice()..upper.as_slice())
            .map_err(ledger_err)?
        {
            let (_, v) = entry.map_err(ledger_err)?;
            let entry: CompletionEntry = serde_json::from_slice(v.value())?;
            out.push(entry.workflow_id);
        }
        Ok(out)
    }
}

impl CompletionLedger for RedbLedger {
    fn record(&self, user_id: &str, workflow_id: &str) -> Result<bool> {
        let key = completion_key(user_id, workflow_id);
        let value = serde_json::to_vec(&CompletionEntry {
            user_id: user_id.to_string(),
            workflow_id: workflow_id.to_string(),
            completed_at: Utc::now(),
        })?;
        let wt = self.db.begin_write().map_err(ledger_err)?;
        let inserted = {
            let mut table = wt.open_table(COMPLETIONS).map_err(ledger_err)?;
            let exists = table.get(key.as_slice()).map_err(ledger_err)?.is_some();
            if !exists {
                table
                    .insert(key.as_slice(), value.as_slice())
                    .map_err(ledger_err)?;
            }
            !exists
        };
        wt.commit().map_err(ledger_err)?;
        Ok(inserted)
    }

    fn count(&self, user_id: &str) -> Result<usize> {
        let (lower, upper) = user_range(user_id);
        let rt = self.db.begin_read().map_err(ledger_err)?;
        let table = rt.open_table(COMPLETIONS).map_err(ledger_err)?;
        let mut n = 0;
        for entry in table
            .range(lower.as_slice()..upper.as_slice())
            .map_err(ledger_err)?
        {
            entry.map_err(ledger_err)?;
            n += 1;
        }
        Ok(n)
    }
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Mutex<BTreeSet<(String, String)>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompletionLedger for MemoryLedger {
    fn record(&self, user_id: &str, workflow_id: &str) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.insert((user_id.to_string(), workflow_id.to_string())))
    }

    fn count(&self, user_id: &str) -> Result<usize> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.iter().filter(|(u, _)| u == user_id).count())
    }
}

// ---------------------------------------------------------------------------
// FreemiumGate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateStatus {
    pub tier: PlanTier,
    pub completions: usize,
    pub limit: Option<usize>,
    pub allowed: bool,
}

pub struct FreemiumGate {
    ledger: Arc<dyn CompletionLedger>,
    tier: PlanTier,
    free_limit: usize,
    user_id: String,
}

impl FreemiumGate {
    pub fn new(
        ledger: Arc<dyn CompletionLedger>,
        tier: PlanTier,
        free_limit: usize,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            tier,
            free_limit,
            user_id: user_id.into(),
        }
    }

    /// Whether the learner may keep working. A ledger that cannot be read
    /// lets them through.
    pub fn check_limit(&self) -> bool {
        self.status().allowed
    }

    pub fn status(&self) -> GateStatus {
        let completions = match self.ledger.count(&self.user_id) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "completion ledger unreadable, allowing access");
                return GateStatus {
                    tier: self.tier,
                    completions: 0,
                    limit: self.limit(),
                    allowed: true,
                };
            }
        };
        let allowed = match self.tier {
            PlanTier::Pro => true,
            PlanTier::Free => completions < self.free_limit,
        };
        GateStatus {
            tier: self.tier,
            completions,
            limit: self.limit(),
            allowed,
        }
    }

    fn limit(&self) -> Option<usize> {
        match self.tier {
            PlanTier::Free => Some(self.free_limit),
            PlanTier::Pro => None,
        }
    }

    /// Record a finished workflow. Failures are logged, never surfaced.
    pub fn record_completion(&self, workflow_id: &str) {
        match self.ledger.record(&self.user_id, workflow_id) {
            Ok(true) => tracing::info!(workflow = workflow_id, "workflow completion recorded"),
            Ok(false) => tracing::debug!(workflow = workflow_id, "workflow already recorded"),
            Err(e) => tracing::warn!(workflow = workflow_id, error = %e, "failed to record completion"),
        }
    }

    /// Record, then check. Returns whether the learner may continue.
    pub fn on_module_completed(&self, workflow_id: &str) -> bool {
        self.record_completion(workflow_id);
        let allowed = self.check_limit();
        if !allowed {
            tracing::info!(user = %self.user_id, "free workflow limit reached");
        }
        allowed
    }

    pub fn tier(&self) -> PlanTier {
        self.tier
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
