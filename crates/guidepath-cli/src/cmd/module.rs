use crate::output::{print_events, print_json};
use crate::workspace::Workspace;
use clap::Subcommand;
use guidepath_core::session::SessionEvent;
use serde::Serialize;
use std::path::Path;

#[derive(Subcommand)]
pub enum ModuleSubcommand {
    /// Make a module active and load (or create) its progress
    Start {
        /// Category id
        category: String,
        /// Module id
        module: String,
    },
    /// Leave the active module; progress is kept
    Stop,
}

pub fn run(root: &Path, subcmd: ModuleSubcommand, json: bool) -> anyhow::Result<()> {
    let mut ws = Workspace::load(root)?;
    match subcmd {
        ModuleSubcommand::Start { category, module } => start(&mut ws, &category, &module, json),
        ModuleSubcommand::Stop => stop(&mut ws, json),
    }
}

#[derive(Serialize)]
struct Started<'a> {
    category: &'a str,
    module: &'a str,
    state: String,
    step_index: usize,
    total_steps: usize,
    gated: bool,
    events: Vec<SessionEvent>,
}

fn start(ws: &mut Workspace, category: &str, module: &str, json: bool) -> anyhow::Result<()> {
    let session = ws.session_for(category, module)?;
    ws.state.set_active(category, module);
    ws.record("start", module);
    ws.save_state()?;

    let machine = session.machine();
    let events = if session.is_gated() {
        vec![SessionEvent::UpgradeRequired]
    } else {
        Vec::new()
    };

    if json {
        return print_json(&Started {
            category,
            module,
            state: machine.state().to_string(),
            step_index: machine.current_index(),
            total_steps: machine.module().steps.len(),
            gated: session.is_gated(),
            events,
        });
    }

    println!(
        "Started: {} ({}), {}",
        machine.module().name,
        machine.module().platform,
        machine.state()
    );
    let step = machine.current_step();
    println!(
        "Step {}/{}: {}",
        machine.current_index() + 1,
        machine.module().steps.len(),
        step.title
    );
    println!("  {}", step.description);
    print_events(&events);
    Ok(())
}

fn stop(ws: &mut Workspace, json: bool) -> anyhow::Result<()> {
    let previous = ws.state.active.as_ref().map(|a| a.module.clone());
    if let Some(module) = &previous {
        ws.record("stop", module);
    }
    ws.state.clear_active();
    ws.save_state()?;

    if json {
        return print_json(&serde_json::json!({ "stopped": previous }));
    }
    match previous {
        Some(module) => println!("Stopped: {module}"),
        None => println!("No active module"),
    }
    Ok(())
}
