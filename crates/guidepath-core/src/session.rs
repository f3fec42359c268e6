//! One learner working through one module.
//!
//! The session wires the simulator's completion outbox into the step state
//! machine, and the machine's completion edge into the freemium gate.

use crate::catalog::Catalog;
use crate::error::{GuideError, Result};
use crate::gate::FreemiumGate;
use crate::machine::{MachineEvent, ProgressSnapshot, StepStateMachine};
use crate::progress::{ProgressStore, QuizResult};
use crate::simulator::{SimEvent, Simulator};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    StepCompleted { step_id: String },
    Advanced { index: usize },
    ModuleCompleted { module_id: String },
    /// The quiz for a just-completed module may be taken.
    QuizAvailable { module_id: String },
    /// The free plan's workflow limit is reached.
    UpgradeRequired,
}

impl From<MachineEvent> for SessionEvent {
    fn from(event: MachineEvent) -> Self {
        match event {
            MachineEvent::StepCompleted { step_id } => SessionEvent::StepCompleted { step_id },
            MachineEvent::Advanced { index } => SessionEvent::Advanced { index },
            MachineEvent::ModuleCompleted { module_id } => {
                SessionEvent::ModuleCompleted { module_id }
            }
        }
    }
}

pub struct LearningSession {
    machine: StepStateMachine,
    simulator: Option<Simulator>,
    gate: FreemiumGate,
    gated: bool,
}

impl LearningSession {
    /// Load progress for the module and run the mount-time limit check.
    pub fn start(
        catalog: Arc<Catalog>,
        store: Arc<dyn ProgressStore>,
        gate: FreemiumGate,
        category: &str,
        module: &str,
    ) -> Result<Self> {
        let machine = StepStateMachine::new(catalog, store, category, module)?;
        let gated = !gate.check_limit();
        if gated {
            tracing::info!(module, "module opened behind the free plan limit");
        }
        Ok(Self {
            machine,
            simulator: None,
            gate,
            gated,
        })
    }

    /// Whether the upgrade overlay should be shown.
    pub fn is_gated(&self) -> bool {
        self.gated
    }

    // -----------------------------------------------------------------------
    // Simulator
    // -----------------------------------------------------------------------

    /// Build a fresh simulator for the module's platform, replacing any
    /// open one.
    pub fn open_simulator(&mut self) -> Result<&mut Simulator> {
        if self.gated {
            return Err(GuideError::UpgradeRequired);
        }
        self.close_simulator();
        Ok(self.simulator.insert(Simulator::open(self.machine.module())))
    }

    pub fn close_simulator(&mut self) {
        if let Some(mut sim) = self.simulator.take() {
            sim.close();
        }
    }

    pub fn simulator(&self) -> Option<&Simulator> {
        self.simulator.as_ref()
    }

    pub fn simulator_mut(&mut self) -> Option<&mut Simulator> {
        self.simulator.as_mut()
    }

    fn current_action(&self) -> String {
        self.machine.current_step().action.clone()
    }

    fn open_sim(&mut self) -> Result<&mut Simulator> {
        self.simulator.as_mut().ok_or(GuideError::SimulatorClosed)
    }

    /// Type a command into the open terminal.
    pub fn submit(&mut self, input: &str) -> Result<()> {
        let action = self.current_action();
        self.open_sim()?.execute(input, Some(&action))
    }

    /// Press a console affordance. Returns whether it was the highlighted one.
    pub fn select(&mut self, affordance: &str) -> Result<bool> {
        let action = self.current_action();
        self.open_sim()?.select(affordance, Some(&action))
    }

    pub fn advance_by(&mut self, ms: u64) -> Vec<SessionEvent> {
        if let Some(sim) = self.simulator.as_mut() {
            sim.advance_by(ms);
        }
        self.collect()
    }

    pub fn advance_to(&mut self, deadline_ms: u64) -> Vec<SessionEvent> {
        if let Some(sim) = self.simulator.as_mut() {
            sim.advance_to(deadline_ms);
        }
        self.collect()
    }

    pub fn run_until_idle(&mut self) -> Vec<SessionEvent> {
        if let Some(sim) = self.simulator.as_mut() {
            sim.run_until_idle();
        }
        self.collect()
    }

    /// Route simulator completions into the state machine.
    fn collect(&mut self) -> Vec<SessionEvent> {
        let sim_events = match self.simulator.as_mut() {
            Some(sim) => sim.take_events(),
            None => return Vec::new(),
        };
        let mut events = Vec::new();
        for event in sim_events {
            match event {
                SimEvent::ActionCompleted { action } => {
                    events.extend(self.complete_action(&action));
                }
            }
        }
        events
    }

    // -----------------------------------------------------------------------
    // Progress
    // -----------------------------------------------------------------------

    /// Complete `action` directly, as the step's action button does.
    pub fn complete_action(&mut self, action: &str) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for event in self.machine.complete_action(action) {
            if let MachineEvent::ModuleCompleted { module_id } = &event {
                let allowed = self.gate.on_module_completed(module_id);
                let module_id = module_id.clone();
                events.push(event.into());
                events.push(SessionEvent::QuizAvailable { module_id });
                if !allowed {
                    self.gated = true;
                    events.push(SessionEvent::UpgradeRequired);
                }
            } else {
                events.push(event.into());
            }
        }
        events
    }

    pub fn go_to_step(&mut self, index: usize) -> usize {
        self.machine.go_to_step(index)
    }

    /// Tear the simulator down, then load the other module.
    pub fn switch_module(&mut self, category: &str, module: &str) -> Result<Vec<SessionEvent>> {
        self.close_simulator();
        self.machine.switch_module(category, module)?;
        self.gated = !self.gate.check_limit();
        Ok(if self.gated {
            vec![SessionEvent::UpgradeRequired]
        } else {
            Vec::new()
        })
    }

    /// Store the quiz result. The quiz only exists for a completed module.
    pub fn record_quiz(&self, passed: bool, score: u32) -> Result<()> {
        if !self.machine.is_done() {
            return Err(GuideError::QuizNotAvailable(self.machine.module().id.clone()));
        }
        self.machine.store().save_quiz_result(
            self.machine.category_id(),
            &self.machine.module().id,
            QuizResult { passed, score },
        )
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.machine.snapshot()
    }

    pub fn machine(&self) -> &StepStateMachine {
        &self.machine
    }

    pub fn gate(&self) -> &FreemiumGate {
        &self.gate
    }
}

impl Drop for LearningSession {
    fn drop(&mut self) {
        self.close_simulator();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
