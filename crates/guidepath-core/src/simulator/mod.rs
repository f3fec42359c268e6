//! Scripted stand-in for a shell or a cloud web console.
//!
//! A [`Simulator`] owns one panel's fake infrastructure, an append-only
//! transcript and a [`Timeline`]. Commands are matched against the
//! platform's ordered [`RuleTable`]; their output lines are released one at
//! a time as the timeline advances, while background status changes fire
//! on their own timers. Nothing is executed for real.

pub mod console;
pub mod docker;
pub mod git;
pub mod kubernetes;
pub mod rules;
pub mod state;
pub mod timeline;

use crate::catalog::Module;
use crate::error::{GuideError, Result};
use crate::types::{LineKind, Platform};
use rules::RuleTable;
use serde::{Deserialize, Serialize};
use state::{Mutation, SimState};
use std::collections::VecDeque;
use timeline::Timeline;

pub use console::Affordance;

// ---------------------------------------------------------------------------
// Transcript lines and events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalLine {
    pub kind: LineKind,
    pub text: String,
    /// Delay before this line appears, counted from the previous line.
    pub delay_ms: u64,
}

impl TerminalLine {
    pub fn input(text: impl Into<String>, delay_ms: u64) -> Self {
        Self::with_kind(LineKind::Input, text, delay_ms)
    }

    pub fn output(text: impl Into<String>, delay_ms: u64) -> Self {
        Self::with_kind(LineKind::Output, text, delay_ms)
    }

    pub fn error(text: impl Into<String>, delay_ms: u64) -> Self {
        Self::with_kind(LineKind::Error, text, delay_ms)
    }

    pub fn success(text: impl Into<String>, delay_ms: u64) -> Self {
        Self::with_kind(LineKind::Success, text, delay_ms)
    }

    fn with_kind(kind: LineKind, text: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            kind,
            text: text.into(),
            delay_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// The command satisfying `action` finished emitting its output.
    ActionCompleted { action: String },
}

/// A single timer's payload.
#[derive(Debug)]
enum Work {
    /// Release the next queued line of the running command.
    EmitLine,
    /// The running command has emitted everything.
    Finish,
    Mutate(Mutation),
}

#[derive(Debug)]
struct RunningCommand {
    pending: VecDeque<TerminalLine>,
    completes: Option<String>,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct Simulator {
    platform: Platform,
    state: SimState,
    rules: RuleTable,
    affordances: Vec<(String, String)>,
    timeline: Timeline<Work>,
    transcript: Vec<TerminalLine>,
    cursor: usize,
    running: Option<RunningCommand>,
    outbox: Vec<SimEvent>,
    closed: bool,
}

impl Simulator {
    /// A fresh panel for `module`. Console affordances come from its steps.
    pub fn open(module: &Module) -> Self {
        let mut sim = Self::for_platform(module.platform);
        if module.platform.is_console() {
            sim.affordances = module
                .steps
                .iter()
                .map(|s| (s.action.clone(), s.title.clone()))
                .collect();
        }
        sim
    }

    /// A fresh panel with no module attached.
    pub fn for_platform(platform: Platform) -> Self {
        let rules = match platform {
            Platform::Docker => docker::rules(),
            Platform::Git => git::rules(),
            Platform::Kubernetes => kubernetes::rules(),
            Platform::Aws | Platform::Github => console::rules(),
        };
        tracing::debug!(platform = %platform, "simulator opened");
        Self {
            platform,
            state: SimState::for_platform(platform),
            rules,
            affordances: Vec::new(),
            timeline: Timeline::new(),
            transcript: Vec::new(),
            cursor: 0,
            running: None,
            outbox: Vec::new(),
            closed: false,
        }
    }

    /// The literal command that completes `action` on a terminal platform.
    pub fn expected_command(platform: Platform, action: &str) -> Option<&'static str> {
        let map = match platform {
            Platform::Docker => docker::EXPECTED,
            Platform::Git => git::EXPECTED,
            Platform::Kubernetes => kubernetes::EXPECTED,
            Platform::Aws | Platform::Github => return None,
        };
        map.iter().find(|(a, _)| *a == action).map(|(_, c)| *c)
    }

    /// Run one typed command.
    ///
    /// The input line lands in the transcript immediately; output follows as
    /// the timeline advances. Blank input is echoed and does nothing else.
    pub fn execute(&mut self, input: &str, current_action: Option<&str>) -> Result<()> {
        self.ensure_ready()?;
        if self.platform.is_console() {
            return Err(GuideError::ConsoleOnly(self.platform.to_string()));
        }
        self.transcript.push(TerminalLine::input(input, 0));
        let command = input.trim();
        if command.is_empty() {
            return Ok(());
        }

        let completes = current_action
            .filter(|a| Self::expected_command(self.platform, a) == Some(command))
            .map(str::to_string);
        self.dispatch(command, completes);
        Ok(())
    }

    /// Press a console affordance.
    ///
    /// Only the highlighted one (the current step's action) does anything;
    /// returns whether it was accepted.
    pub fn select(&mut self, affordance: &str, current_action: Option<&str>) -> Result<bool> {
        self.ensure_ready()?;
        if !self.platform.is_console() {
            return Err(GuideError::TerminalOnly(self.platform.to_string()));
        }
        let Some((id, label)) = self
            .affordances
            .iter()
            .find(|(id, _)| id == affordance)
            .cloned()
        else {
            return Err(GuideError::UnknownAffordance(affordance.to_string()));
        };
        if current_action != Some(id.as_str()) {
            tracing::debug!(affordance, "affordance not highlighted, ignored");
            return Ok(false);
        }
        self.transcript.push(TerminalLine::input(label, 0));
        self.dispatch(&id, Some(id.clone()));
        Ok(true)
    }

    /// Affordances with the highlight on `current_action`.
    pub fn affordances(&self, current_action: Option<&str>) -> Result<Vec<Affordance>> {
        if !self.platform.is_console() {
            return Err(GuideError::TerminalOnly(self.platform.to_string()));
        }
        Ok(self
            .affordances
            .iter()
            .map(|(id, label)| Affordance {
                id: id.clone(),
                label: label.clone(),
                highlighted: current_action == Some(id.as_str()),
            })
            .collect())
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.closed {
            return Err(GuideError::SimulatorClosed);
        }
        if self.running.is_some() {
            return Err(GuideError::SimulatorBusy);
        }
        Ok(())
    }

    fn dispatch(&mut self, command: &str, completes: Option<String>) {
        let dispatch = self.rules.dispatch(&mut self.state, command);
        for deferred in dispatch.deferred {
            self.timeline
                .schedule(deferred.delay_ms, Work::Mutate(deferred.mutation));
        }
        self.running = Some(RunningCommand {
            pending: dispatch.lines.into(),
            completes,
        });
        self.schedule_next_line();
    }

    /// Keep at most one emission timer pending: the next line is scheduled
    /// only once the previous one has fired.
    fn schedule_next_line(&mut self) {
        let Some(running) = &self.running else {
            return;
        };
        match running.pending.front() {
            Some(line) => self.timeline.schedule(line.delay_ms, Work::EmitLine),
            None => self.timeline.schedule(0, Work::Finish),
        }
    }

    fn fire(&mut self, work: Work) {
        match work {
            Work::EmitLine => {
                if let Some(line) = self.running.as_mut().and_then(|r| r.pending.pop_front()) {
                    self.transcript.push(line);
                }
                self.schedule_next_line();
            }
            Work::Finish => {
                if let Some(RunningCommand {
                    completes: Some(action),
                    ..
                }) = self.running.take()
                {
                    tracing::debug!(action = %action, "simulated command completed action");
                    self.outbox.push(SimEvent::ActionCompleted { action });
                }
            }
            Work::Mutate(mutation) => self.state.apply(&mutation),
        }
    }

    // -----------------------------------------------------------------------
    // Tick source
    // -----------------------------------------------------------------------

    pub fn now_ms(&self) -> u64 {
        self.timeline.now_ms()
    }

    /// Absolute virtual time of the next pending timer.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timeline.next_deadline()
    }

    /// Fire everything due by `deadline_ms`, in order.
    pub fn advance_to(&mut self, deadline_ms: u64) {
        if self.closed {
            return;
        }
        while let Some(work) = self.timeline.pop_due(deadline_ms) {
            self.fire(work);
        }
        self.timeline.settle_at(deadline_ms);
    }

    pub fn advance_by(&mut self, ms: u64) {
        let deadline = self.timeline.now_ms().saturating_add(ms);
        self.advance_to(deadline);
    }

    /// Fire every pending timer, including background ones.
    pub fn run_until_idle(&mut self) {
        while let Some(deadline) = self.next_deadline() {
            if self.closed {
                break;
            }
            self.advance_to(deadline);
        }
    }

    /// Tear down: drop pending timers and queued output. Never fails.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        let cancelled = self.timeline.cancel_all();
        self.running = None;
        self.closed = true;
        tracing::debug!(platform = %self.platform, cancelled, "simulator closed");
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn is_busy(&self) -> bool {
        self.running.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn transcript(&self) -> &[TerminalLine] {
        &self.transcript
    }

    /// Lines appended since the previous call.
    pub fn drain_new_lines(&mut self) -> Vec<TerminalLine> {
        let lines = self.transcript[self.cursor..].to_vec();
        self.cursor = self.transcript.len();
        lines
    }

    pub fn take_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.close();
    }
}

/// Fallback `help` output: the commands a platform's steps expect.
pub(crate) fn help_lines(expected: &[(&str, &str)]) -> Vec<TerminalLine> {
    let mut lines = vec![TerminalLine::output("Commands this terminal understands:", 50)];
    lines.extend(
        expected
            .iter()
            .map(|(_, command)| TerminalLine::output(format!("  {command}"), 0)),
    );
    lines
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
