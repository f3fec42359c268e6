use crate::output::print_json;
use crate::workspace::Workspace;
use clap::Subcommand;
use guidepath_core::gate::GateStatus;
use std::path::Path;

#[derive(Subcommand)]
pub enum GateSubcommand {
    /// Show plan, completed workflows and whether new modules are allowed
    Status,
}

pub fn run(root: &Path, subcmd: GateSubcommand, json: bool) -> anyhow::Result<()> {
    let ws = Workspace::load(root)?;
    match subcmd {
        GateSubcommand::Status => {
            let status = ws.gate()?.status();
            if json {
                return print_json(&status);
            }
            println!("{}", describe(&status));
            Ok(())
        }
    }
}

pub fn describe(status: &GateStatus) -> String {
    let used = match status.limit {
        Some(limit) => format!("{}/{} workflows", status.completions, limit),
        None => format!("{} workflows, unlimited", status.completions),
    };
    let verdict = if status.allowed { "allowed" } else { "upgrade required" };
    format!("Plan:     {} ({used}), {verdict}", status.tier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidepath_core::gate::PlanTier;

    #[test]
    fn free_plan_shows_limit() {
        let status = GateStatus {
            tier: PlanTier::Free,
            completions: 3,
            limit: Some(3),
            allowed: false,
        };
        let line = describe(&status);
        assert!(line.contains("3/3"));
        assert!(line.contains("upgrade required"));
    }

    #[test]
    fn pro_plan_is_unlimited() {
        let status = GateStatus {
            tier: PlanTier::Pro,
            completions: 12,
            limit: None,
            allowed: true,
        };
        assert!(describe(&status).contains("unlimited"));
    }
}
