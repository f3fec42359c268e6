use crate::output::{print_events, print_json};
use crate::workspace::Workspace;
use clap::Subcommand;
use guidepath_core::session::SessionEvent;
use serde::Serialize;
use std::path::Path;

#[derive(Subcommand)]
pub enum StepSubcommand {
    /// Complete the current step by its action token (the step's button)
    Complete {
        /// Action token; must match the current step
        action: String,
    },
    /// Jump to a step by number, as shown in `guidepath status`
    Goto {
        /// 1-based step number; out-of-range values are clamped
        number: usize,
    },
}

#[derive(Serialize)]
struct StepOutput {
    step_index: usize,
    step_id: String,
    title: String,
    events: Vec<SessionEvent>,
}

pub fn run(root: &Path, subcmd: StepSubcommand, json: bool) -> anyhow::Result<()> {
    let mut ws = Workspace::load(root)?;
    let mut session = ws.active_session()?;

    let mut matched = true;
    let events = match &subcmd {
        StepSubcommand::Complete { action } => {
            matched = session.machine().current_step().action == *action;
            let events = session.complete_action(action);
            ws.record("complete", action);
            events
        }
        StepSubcommand::Goto { number } => {
            let applied = session.go_to_step(number.saturating_sub(1));
            ws.record("goto", &(applied + 1).to_string());
            Vec::new()
        }
    };
    ws.save_state()?;

    let machine = session.machine();
    let step = machine.current_step();
    let out = StepOutput {
        step_index: machine.current_index(),
        step_id: step.id.clone(),
        title: step.title.clone(),
        events,
    };

    if json {
        return print_json(&out);
    }
    if let StepSubcommand::Complete { action } = &subcmd {
        if !matched {
            println!("'{action}' is not the current step's action; nothing changed");
        } else if out.events.is_empty() {
            println!("'{action}' is already complete; nothing changed");
        }
    }
    print_events(&out.events);
    if machine.is_done() {
        println!("All {} steps complete.", machine.module().steps.len());
    } else {
        println!(
            "Step {}/{}: {}",
            out.step_index + 1,
            machine.module().steps.len(),
            out.title
        );
    }
    Ok(())
}
