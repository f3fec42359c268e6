use crate::error::Result;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub passed: bool,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub category_id: String,
    pub module_id: String,
    #[serde(default)]
    pub completed_step_ids: BTreeSet<String>,
    #[serde(default)]
    pub current_step_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_result: Option<QuizResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn new(category_id: impl Into<String>, module_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            category_id: category_id.into(),
            module_id: module_id.into(),
            completed_step_ids: BTreeSet::new(),
            current_step_index: 0,
            quiz_result: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressStore
// ---------------------------------------------------------------------------

/// Key-value persistence of learner progress, keyed by `(category, module)`.
///
/// There is no delete: a record, once created, lives for the
/// lifetime of the workspace.
pub trait ProgressStore: Send + Sync {
    /// `Ok(None)` when nothing was ever saved for the pair.
    fn get(&self, category: &str, module: &str) -> Result<Option<ProgressRecord>>;

    /// Write-through save of step progress. Keeps any stored quiz result.
    fn save(
        &self,
        category: &str,
        module: &str,
        completed: &BTreeSet<String>,
        current_index: usize,
    ) -> Result<()>;

    /// Additive quiz write. Never touches completed steps or the index.
    fn save_quiz_result(&self, category: &str, module: &str, result: QuizResult) -> Result<()>;

    fn list(&self) -> Result<Vec<ProgressRecord>>;
}

fn apply_save(
    existing: Option<ProgressRecord>,
    category: &str,
    module: &str,
    completed: &BTreeSet<String>,
    current_index: usize,
) -> ProgressRecord {
    let mut record = existing.unwrap_or_else(|| ProgressRecord::new(category, module));
    record.completed_step_ids = completed.clone();
    record.current_step_index = current_index;
    record.updated_at = Utc::now();
    record
}

fn apply_quiz(
    existing: Option<ProgressRecord>,
    category: &str,
    module: &str,
    result: QuizResult,
) -> ProgressRecord {
    let mut record = existing.unwrap_or_else(|| ProgressRecord::new(category, module));
    record.quiz_result = Some(result);
    record.updated_at = Utc::now();
    record
}

// ---------------------------------------------------------------------------
// FileProgressStore
// ---------------------------------------------------------------------------

/// One YAML file per module under `.guidepath/progress/<category>/`.
pub struct FileProgressStore {
    root: PathBuf,
}

impl FileProgressStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn path(&self, category: &str, module: &str) -> Result<PathBuf> {
        paths::validate_slug(category)?;
        paths::validate_slug(module)?;
        Ok(paths::progress_path(&self.root, category, module))
    }
}

impl ProgressStore for FileProgressStore {
    fn get(&self, category: &str, module: &str) -> Result<Option<ProgressRecord>> {
        crate::io::read_yaml(&self.path(category, module)?)
    }

    fn save(
        &self,
        category: &str,
        module: &str,
        completed: &BTreeSet<String>,
        current_index: usize,
    ) -> Result<()> {
        let path = self.path(category, module)?;
        let existing = crate::io::read_yaml(&path)?;
        let record = apply_save(existing, category, module, completed, current_index);
        crate::io::write_yaml(&path, &record)
    }

    fn save_quiz_result(&self, category: &str, module: &str, result: QuizResult) -> Result<()> {
        let path = self.path(category, module)?;
        let existing = crate::io::read_yaml(&path)?;
        let record = apply_quiz(existing, category, module, result);
        crate::io::write_yaml(&path, &record)
    }

    fn list(&self) -> Result<Vec<ProgressRecord>> {
        let dir = paths::progress_dir(&self.root);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for cat in std::fs::read_dir(&dir)? {
            let cat = cat?;
            if !cat.file_type()?.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(cat.path())? {
                let path = entry?.path();
                if path.extension().is_some_and(|e| e == "yaml") {
                    if let Some(record) = crate::io::read_yaml::<ProgressRecord>(&path)? {
                        records.push(record);
                    }
                }
            }
        }
        records.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// MemoryProgressStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryProgressStore {
    records: Mutex<BTreeMap<(String, String), ProgressRecord>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<(String, String), ProgressRecord>) -> T,
    ) -> T {
        // A poisoned lock only means another test thread panicked mid-write.
        let mut guard = self.records.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl ProgressStore for MemoryProgressStore {
    fn get(&self, category: &str, module: &str) -> Result<Option<ProgressRecord>> {
        Ok(self.with_records(|r| {
            r.get(&(category.to_string(), module.to_string())).cloned()
        }))
    }

    fn save(
        &self,
        category: &str,
        module: &str,
        completed: &BTreeSet<String>,
        current_index: usize,
    ) -> Result<()> {
        self.with_records(|r| {
            let key = (category.to_string(), module.to_string());
            let record = apply_save(r.remove(&key), category, module, completed, current_index);
            r.insert(key, record);
        });
        Ok(())
    }

    fn save_quiz_result(&self, category: &str, module: &str, result: QuizResult) -> Result<()> {
        self.with_records(|r| {
            let key = (category.to_string(), module.to_string());
            let record = apply_quiz(r.remove(&key), category, module, result);
            r.insert(key, record);
        });
        Ok(())
    }

    fn list(&self) -> Result<Vec<ProgressRecord>> {
        Ok(self.with_records(|r| r.values().cloned().collect()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn exercise(store: &dyn ProgressStore) {
        assert!(store.get("containers", "docker-images").unwrap().is_none());

        store
            .save("containers", "docker-images", &ids(&["build-image"]), 1)
            .unwrap();
        let record = store.get("containers", "docker-images").unwrap().unwrap();
        assert_eq!(record.completed_step_ids, ids(&["build-image"]));
        assert_eq!(record.current_step_index, 1);
        assert!(record.quiz_result.is_none());

        store
            .save_quiz_result(
                "containers",
                "docker-images",
                QuizResult {
                    passed: true,
                    score: 80,
                },
            )
            .unwrap();
        let record = store.get("containers", "docker-images").unwrap().unwrap();
        assert_eq!(record.completed_step_ids, ids(&["build-image"]));
        assert_eq!(record.current_step_index, 1);
        assert_eq!(record.quiz_result.unwrap().score, 80);

        // Step saves keep the quiz result.
        store
            .save(
                "containers",
                "docker-images",
                &ids(&["build-image", "list-images"]),
                2,
            )
            .unwrap();
        let record = store.get("containers", "docker-images").unwrap().unwrap();
        assert!(record.quiz_result.unwrap().passed);
        assert_eq!(record.current_step_index, 2);
    }

    #[test]
    fn memory_store_contract() {
        exercise(&MemoryProgressStore::new());
    }

    #[test]
    fn file_store_contract() {
        let dir = TempDir::new().unwrap();
        exercise(&FileProgressStore::new(dir.path()));
        assert!(paths::progress_path(dir.path(), "containers", "docker-images").exists());
    }

    #[test]
    fn quiz_result_creates_record_without_progress() {
        let store = MemoryProgressStore::new();
        store
            .save_quiz_result(
                "cloud",
                "ec2-launch",
                QuizResult {
                    passed: false,
                    score: 40,
                },
            )
            .unwrap();
        let record = store.get("cloud", "ec2-launch").unwrap().unwrap();
        assert!(record.completed_step_ids.is_empty());
        assert_eq!(record.current_step_index, 0);
    }

    #[test]
    fn file_store_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let store = FileProgressStore::new(dir.path());
        assert!(store.get("../etc", "passwd").is_err());
    }

    #[test]
    fn file_store_lists_records() {
        let dir = TempDir::new().unwrap();
        let store = FileProgressStore::new(dir.path());
        store.save("containers", "docker-images", &ids(&[]), 0).unwrap();
        store.save("cloud", "ec2-launch", &ids(&["open-ec2"]), 1).unwrap();
        let records = store.list().unwrap();
        assert_eq!(records.len(), 2);
    }
}
