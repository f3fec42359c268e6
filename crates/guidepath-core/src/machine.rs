use crate::catalog::{Catalog, Module, Step};
use crate::error::Result;
use crate::progress::ProgressStore;
use crate::types::Platform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// States and events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MachineState {
    NotStarted,
    InProgress { index: usize },
    Completed,
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineState::NotStarted => f.write_str("not started"),
            MachineState::InProgress { index } => write!(f, "in progress (step {})", index + 1),
            MachineState::Completed => f.write_str("completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MachineEvent {
    StepCompleted { step_id: String },
    Advanced { index: usize },
    /// Fired once, on the transition into the fully completed state.
    ModuleCompleted { module_id: String },
}

/// A step with its derived completion flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub index: usize,
    pub completed: bool,
    pub current: bool,
    #[serde(flatten)]
    pub step: Step,
}

// ---------------------------------------------------------------------------
// ProgressSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Point-in-time view of where the learner is, handed to the mentor bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub platform: Platform,
    pub module: String,
    pub current_step: Option<StepSummary>,
    pub step_index: usize,
    pub total_steps: usize,
    pub completed_steps: Vec<String>,
}

// ---------------------------------------------------------------------------
// StepStateMachine
// ---------------------------------------------------------------------------

pub struct StepStateMachine {
    catalog: Arc<Catalog>,
    store: Arc<dyn ProgressStore>,
    category_id: String,
    module: Module,
    completed: BTreeSet<String>,
    index: usize,
    /// Completed count observed after the last mutation; the completion edge
    /// is detected against this, never against the current level alone.
    seen_completed: usize,
}

impl StepStateMachine {
    pub fn new(
        catalog: Arc<Catalog>,
        store: Arc<dyn ProgressStore>,
        category: &str,
        module: &str,
    ) -> Result<Self> {
        let loaded = catalog.module_in(category, module)?.clone();
        let mut machine = Self {
            catalog,
            store,
            category_id: category.to_string(),
            module: loaded,
            completed: BTreeSet::new(),
            index: 0,
            seen_completed: 0,
        };
        machine.restore();
        Ok(machine)
    }

    /// Re-initialize from stored progress for another module.
    pub fn switch_module(&mut self, category: &str, module: &str) -> Result<()> {
        self.module = self.catalog.module_in(category, module)?.clone();
        self.category_id = category.to_string();
        self.restore();
        Ok(())
    }

    fn restore(&mut self) {
        let record = match self.store.get(&self.category_id, &self.module.id) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(
                    category = %self.category_id,
                    module = %self.module.id,
                    "failed to load progress, starting fresh: {e}"
                );
                None
            }
        };

        match record {
            Some(record) => {
                let total = self.module.steps.len();
                let (known, unknown): (BTreeSet<String>, BTreeSet<String>) = record
                    .completed_step_ids
                    .into_iter()
                    .partition(|id| self.module.has_step(id));
                if !unknown.is_empty() {
                    tracing::warn!(
                        module = %self.module.id,
                        "dropping completed ids not in module: {:?}",
                        unknown
                    );
                }
                self.completed = known;
                self.index = record.current_step_index.min(total - 1);
            }
            None => {
                self.completed = BTreeSet::new();
                self.index = 0;
                // First navigation into the module creates its record.
                self.persist();
            }
        }
        self.seen_completed = self.completed.len();
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Advance when `action` matches the current step's action. A mismatch is
    /// a silent no-op. Progress is persisted after every call.
    pub fn complete_action(&mut self, action: &str) -> Vec<MachineEvent> {
        let mut events = Vec::new();
        let step = &self.module.steps[self.index];

        if step.action == action {
            if self.completed.insert(step.id.clone()) {
                events.push(MachineEvent::StepCompleted {
                    step_id: step.id.clone(),
                });
            }
            if self.index + 1 < self.module.steps.len() {
                self.index += 1;
                events.push(MachineEvent::Advanced { index: self.index });
            }
        } else {
            tracing::debug!(
                expected = %step.action,
                got = %action,
                "action does not match current step"
            );
        }

        self.persist();
        events.extend(self.completion_edge());
        events
    }

    /// Move the cursor directly, clamped to the module's steps. Returns the
    /// index actually applied.
    pub fn go_to_step(&mut self, index: usize) -> usize {
        self.index = index.min(self.module.steps.len() - 1);
        self.persist();
        self.index
    }

    fn completion_edge(&mut self) -> Option<MachineEvent> {
        let total = self.module.steps.len();
        let count = self.completed.len();
        let fired = self.seen_completed < total && count == total;
        self.seen_completed = count;
        if fired {
            tracing::info!(module = %self.module.id, "module completed");
            Some(MachineEvent::ModuleCompleted {
                module_id: self.module.id.clone(),
            })
        } else {
            None
        }
    }

    fn persist(&self) {
        if let Err(e) =
            self.store
                .save(&self.category_id, &self.module.id, &self.completed, self.index)
        {
            tracing::warn!(
                category = %self.category_id,
                module = %self.module.id,
                "failed to persist progress: {e}"
            );
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn state(&self) -> MachineState {
        if self.completed.len() == self.module.steps.len() {
            MachineState::Completed
        } else if self.index == 0 && self.completed.is_empty() {
            MachineState::NotStarted
        } else {
            MachineState::InProgress { index: self.index }
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state(), MachineState::Completed)
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn current_step(&self) -> &Step {
        &self.module.steps[self.index]
    }

    pub fn steps(&self) -> Vec<StepView> {
        self.module
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| StepView {
                index: i,
                completed: self.completed.contains(&step.id),
                current: i == self.index,
                step: step.clone(),
            })
            .collect()
    }

    pub fn completed_steps(&self) -> &BTreeSet<String> {
        &self.completed
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let step = self.current_step();
        ProgressSnapshot {
            platform: self.module.platform,
            module: self.module.name.clone(),
            current_step: Some(StepSummary {
                title: step.title.clone(),
                description: step.description.clone(),
                tip: step.tip.clone(),
                warning: step.warning.clone(),
            }),
            step_index: self.index,
            total_steps: self.module.steps.len(),
            completed_steps: self.completed.iter().cloned().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use crate::error::GuideError;
    use crate::progress::{MemoryProgressStore, ProgressRecord, QuizResult};

    fn two_step_catalog() -> Arc<Catalog> {
        Arc::new(Catalog {
            categories: vec![Category {
                id: "basics".into(),
                name: "Basics".into(),
                modules: vec!["pair".into(), "solo".into()],
            }],
            modules: vec![
                Module {
                    id: "pair".into(),
                    name: "Pair".into(),
                    platform: Platform::Docker,
                    description: None,
                    steps: vec![
                        Step::new("one", "One", "first", "act-one"),
                        Step::new("two", "Two", "second", "act-two").tip("hint"),
                    ],
                },
                Module {
                    id: "solo".into(),
                    name: "Solo".into(),
                    platform: Platform::Git,
                    description: None,
                    steps: vec![Step::new("only", "Only", "single", "act-only")],
                },
            ],
        })
    }

    fn machine(store: Arc<MemoryProgressStore>) -> StepStateMachine {
        StepStateMachine::new(two_step_catalog(), store, "basics", "pair").unwrap()
    }

    #[test]
    fn fresh_module_is_not_started_and_persisted() {
        let store = Arc::new(MemoryProgressStore::new());
        let m = machine(store.clone());
        assert_eq!(m.state(), MachineState::NotStarted);
        assert_eq!(m.current_index(), 0);
        let record = store.get("basics", "pair").unwrap().unwrap();
        assert_eq!(record.current_step_index, 0);
        assert!(record.completed_step_ids.is_empty());
    }

    #[test]
    fn matching_action_advances_and_completion_fires_once() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut m = machine(store.clone());

        let events = m.complete_action("act-one");
        assert_eq!(
            events,
            vec![
                MachineEvent::StepCompleted {
                    step_id: "one".into()
                },
                MachineEvent::Advanced { index: 1 },
            ]
        );
        assert_eq!(m.current_index(), 1);
        assert!(!m.completed_steps().contains("two"));
        assert_eq!(m.state(), MachineState::InProgress { index: 1 });

        let events = m.complete_action("act-two");
        assert_eq!(
            events,
            vec![
                MachineEvent::StepCompleted {
                    step_id: "two".into()
                },
                MachineEvent::ModuleCompleted {
                    module_id: "pair".into()
                },
            ]
        );
        assert!(m.is_done());
        assert_eq!(m.current_index(), 1);

        // Re-reads and repeated actions never re-fire the completion edge.
        for _ in 0..3 {
            assert_eq!(m.state(), MachineState::Completed);
            let again = m.complete_action("act-two");
            assert!(!again
                .iter()
                .any(|e| matches!(e, MachineEvent::ModuleCompleted { .. })));
        }
    }

    #[test]
    fn mismatched_action_changes_nothing() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut m = machine(store.clone());
        m.complete_action("act-one");
        let before = m.completed_steps().clone();

        for token in ["act-one", "ACT-TWO", "", "act-two "] {
            assert!(m.complete_action(token).is_empty());
            assert_eq!(m.completed_steps(), &before);
            assert_eq!(m.current_index(), 1);
        }
    }

    #[test]
    fn go_to_step_clamps() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut m = machine(store.clone());
        assert_eq!(m.go_to_step(99), 1);
        assert_eq!(m.current_index(), 1);
        assert_eq!(m.go_to_step(0), 0);
        assert_eq!(store.get("basics", "pair").unwrap().unwrap().current_step_index, 0);
    }

    #[test]
    fn index_stays_in_range_under_any_sequence() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut m = machine(store);
        for round in 0..60usize {
            match (round * 7 + round / 3) % 6 {
                0 => {
                    m.complete_action("act-one");
                }
                1 => {
                    m.complete_action("act-two");
                }
                2 => {
                    m.complete_action("bogus");
                }
                3 => {
                    m.go_to_step(usize::MAX);
                }
                4 => {
                    m.go_to_step(0);
                }
                _ => {
                    m.go_to_step(1);
                }
            }
            assert!(m.current_index() < m.module().steps.len());
        }
    }

    #[test]
    fn resume_restores_saved_progress() {
        let store = Arc::new(MemoryProgressStore::new());
        {
            let mut m = machine(store.clone());
            m.complete_action("act-one");
            m.go_to_step(0);
        }
        let m = machine(store);
        assert_eq!(m.current_index(), 0);
        assert_eq!(
            m.completed_steps().iter().cloned().collect::<Vec<_>>(),
            vec!["one".to_string()]
        );
        assert_eq!(m.state(), MachineState::InProgress { index: 0 });
    }

    #[test]
    fn restoring_completed_module_does_not_refire() {
        let store = Arc::new(MemoryProgressStore::new());
        {
            let mut m = machine(store.clone());
            m.complete_action("act-one");
            m.complete_action("act-two");
        }
        let mut m = machine(store);
        assert!(m.is_done());
        let events = m.complete_action("act-two");
        assert!(!events
            .iter()
            .any(|e| matches!(e, MachineEvent::ModuleCompleted { .. })));
    }

    #[test]
    fn restore_sanitizes_foreign_ids_and_bad_index() {
        let store = Arc::new(MemoryProgressStore::new());
        let completed: BTreeSet<String> = ["one", "ghost"].iter().map(|s| s.to_string()).collect();
        store.save("basics", "pair", &completed, 17).unwrap();

        let m = machine(store);
        assert_eq!(m.current_index(), 1);
        assert_eq!(m.completed_steps().len(), 1);
        assert!(m.completed_steps().contains("one"));
    }

    #[test]
    fn switch_module_reinitializes() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut m = machine(store.clone());
        m.complete_action("act-one");

        m.switch_module("basics", "solo").unwrap();
        assert_eq!(m.module().id, "solo");
        assert_eq!(m.state(), MachineState::NotStarted);
        let events = m.complete_action("act-only");
        assert!(events.contains(&MachineEvent::ModuleCompleted {
            module_id: "solo".into()
        }));

        m.switch_module("basics", "pair").unwrap();
        assert_eq!(m.current_index(), 1);
    }

    #[test]
    fn unknown_module_is_an_error() {
        let store = Arc::new(MemoryProgressStore::new());
        let result = StepStateMachine::new(two_step_catalog(), store, "basics", "missing");
        assert!(matches!(result, Err(GuideError::ModuleNotInCategory { .. })));
    }

    struct FailingStore;

    impl ProgressStore for FailingStore {
        fn get(&self, _: &str, _: &str) -> Result<Option<ProgressRecord>> {
            Err(std::io::Error::other("disk gone").into())
        }
        fn save(&self, _: &str, _: &str, _: &BTreeSet<String>, _: usize) -> Result<()> {
            Err(std::io::Error::other("disk gone").into())
        }
        fn save_quiz_result(&self, _: &str, _: &str, _: QuizResult) -> Result<()> {
            Err(std::io::Error::other("disk gone").into())
        }
        fn list(&self) -> Result<Vec<ProgressRecord>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn persistence_failures_do_not_interrupt_the_workflow() {
        let mut m =
            StepStateMachine::new(two_step_catalog(), Arc::new(FailingStore), "basics", "pair")
                .unwrap();
        m.complete_action("act-one");
        let events = m.complete_action("act-two");
        assert!(events.contains(&MachineEvent::ModuleCompleted {
            module_id: "pair".into()
        }));
    }

    #[test]
    fn snapshot_reflects_current_step() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut m = machine(store);
        m.complete_action("act-one");
        let snap = m.snapshot();
        assert_eq!(snap.platform, Platform::Docker);
        assert_eq!(snap.step_index, 1);
        assert_eq!(snap.total_steps, 2);
        assert_eq!(snap.completed_steps, vec!["one".to_string()]);
        let step = snap.current_step.unwrap();
        assert_eq!(step.title, "Two");
        assert_eq!(step.tip.as_deref(), Some("hint"));
    }
}
