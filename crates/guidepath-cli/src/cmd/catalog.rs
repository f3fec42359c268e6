use crate::output::{print_json, print_table};
use crate::workspace::Workspace;
use anyhow::Context;
use clap::Subcommand;
use guidepath_core::catalog::Catalog;
use guidepath_core::simulator::Simulator;
use serde::Serialize;
use std::path::Path;

#[derive(Subcommand)]
pub enum CatalogSubcommand {
    /// List categories and their modules
    List,
    /// Show a module's steps
    Show {
        /// Module id
        module: String,
    },
}

pub fn run(root: &Path, subcmd: CatalogSubcommand, json: bool) -> anyhow::Result<()> {
    // Browsing works before `init`; progress does not.
    let ws = Workspace::load(root).ok();
    let catalog = match &ws {
        Some(ws) => ws.catalog.as_ref().clone(),
        None => Catalog::load(root).context("failed to load catalog")?,
    };
    match subcmd {
        CatalogSubcommand::List => list(&catalog, ws.as_ref(), json),
        CatalogSubcommand::Show { module } => show(&catalog, &module, json),
    }
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ModuleRow<'a> {
    category: &'a str,
    id: &'a str,
    name: &'a str,
    platform: &'a str,
    steps: usize,
    completed: Option<usize>,
}

fn list(catalog: &Catalog, ws: Option<&Workspace>, json: bool) -> anyhow::Result<()> {
    let store = ws.map(|w| w.store());
    let mut rows = Vec::new();
    for category in catalog.categories() {
        for module in catalog.modules_for(&category.id)? {
            let completed = match &store {
                Some(store) => Some(
                    store
                        .get(&category.id, &module.id)?
                        .map(|r| r.completed_step_ids.len())
                        .unwrap_or(0),
                ),
                None => None,
            };
            rows.push(ModuleRow {
                category: &category.id,
                id: &module.id,
                name: &module.name,
                platform: module.platform.as_str(),
                steps: module.steps.len(),
                completed,
            });
        }
    }

    if json {
        return print_json(&rows);
    }
    print_table(
        &["CATEGORY", "MODULE", "PLATFORM", "PROGRESS", "NAME"],
        rows.iter()
            .map(|r| {
                vec![
                    r.category.to_string(),
                    r.id.to_string(),
                    r.platform.to_string(),
                    match r.completed {
                        Some(done) => format!("{done}/{}", r.steps),
                        None => format!("-/{}", r.steps),
                    },
                    r.name.to_string(),
                ]
            })
            .collect(),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(catalog: &Catalog, module_id: &str, json: bool) -> anyhow::Result<()> {
    let module = catalog.module(module_id)?;
    if json {
        return print_json(module);
    }

    println!("{} ({})", module.name, module.platform);
    if let Some(desc) = &module.description {
        println!("{desc}");
    }
    if let Some(category) = catalog.category_of(&module.id) {
        println!("Start: guidepath module start {} {}", category.id, module.id);
    }
    println!();
    for (i, step) in module.steps.iter().enumerate() {
        println!("{}. {}  [{}]", i + 1, step.title, step.id);
        println!("   {}", step.description);
        if let Some(cmd) = Simulator::expected_command(module.platform, &step.action) {
            println!("   $ {cmd}");
        }
        if let Some(tip) = &step.tip {
            println!("   tip: {tip}");
        }
        if let Some(warning) = &step.warning {
            println!("   warning: {warning}");
        }
    }
    Ok(())
}
