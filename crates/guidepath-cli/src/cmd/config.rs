use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use guidepath_core::config::{Config, WarnLevel};
use guidepath_core::gate::PlanTier;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,

    /// Change the plan tier and, optionally, the free workflow limit
    SetPlan {
        /// free or pro
        tier: PlanTier,
        /// Workflows a free learner may complete
        #[arg(long)]
        limit: Option<usize>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
        ConfigSubcommand::SetPlan { tier, limit } => set_plan(root, tier, limit, json),
    }
}

fn load(root: &Path) -> anyhow::Result<Config> {
    Config::load(root).context("failed to load config")
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load(root)?;
    if json {
        return print_json(&config);
    }
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load(root)?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// set-plan
// ---------------------------------------------------------------------------

fn set_plan(root: &Path, tier: PlanTier, limit: Option<usize>, json: bool) -> anyhow::Result<()> {
    let mut config = load(root)?;
    config.plan.tier = tier;
    if let Some(limit) = limit {
        config.plan.free_workflow_limit = limit;
    }
    config.save(root).context("failed to write config.yaml")?;

    if json {
        return print_json(&config.plan);
    }
    println!(
        "Plan set to {} (free limit {})",
        config.plan.tier, config.plan.free_workflow_limit
    );
    Ok(())
}
