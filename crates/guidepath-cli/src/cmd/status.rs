use crate::output::{print_json, print_table};
use crate::workspace::Workspace;
use guidepath_core::gate::GateStatus;
use guidepath_core::machine::StepView;
use guidepath_core::state::HistoryEntry;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct StatusOutput<'a> {
    category: &'a str,
    module: &'a str,
    name: &'a str,
    platform: &'a str,
    state: String,
    steps: Vec<StepView>,
    gate: GateStatus,
    last_action: Option<&'a HistoryEntry>,
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::load(root)?;
    let (category, module) = ws.state.require_active()?;
    let session = ws.session_for(category, module)?;
    let machine = session.machine();

    let out = StatusOutput {
        category,
        module,
        name: &machine.module().name,
        platform: machine.module().platform.as_str(),
        state: machine.state().to_string(),
        steps: machine.steps(),
        gate: session.gate().status(),
        last_action: ws.state.last_action(),
    };

    if json {
        return print_json(&out);
    }

    println!("Module:   {} ({}/{})", out.name, out.category, out.module);
    println!("Platform: {}", out.platform);
    println!("State:    {}", out.state);
    println!();
    print_table(
        &["#", "", "STEP", "ACTION"],
        out.steps
            .iter()
            .map(|s| {
                let mark = match (s.completed, s.current) {
                    (true, _) => "✓",
                    (false, true) => "→",
                    (false, false) => " ",
                };
                vec![
                    (s.index + 1).to_string(),
                    mark.to_string(),
                    s.step.title.clone(),
                    s.step.action.clone(),
                ]
            })
            .collect(),
    );
    println!();
    println!("{}", super::gate::describe(&out.gate));
    if session.is_gated() {
        println!("This module is behind the free plan limit; upgrade to continue.");
    }
    if let Some(last) = out.last_action {
        println!("Last:     {} {} ({})", last.action, last.detail, last.timestamp.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}
