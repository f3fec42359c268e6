use anyhow::Context;
use guidepath_core::{config::Config, io, paths, state::State};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing guidepath in: {}", root.display());

    for dir in [paths::GUIDEPATH_DIR, paths::PROGRESS_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    // The learner id keys the completion ledger, so an existing config is
    // never regenerated.
    if paths::config_path(root).exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        let cfg = Config::generate();
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {} (learner {})", paths::CONFIG_FILE, cfg.learner.id);
    }

    if paths::state_path(root).exists() {
        println!("  exists:  {}", paths::STATE_FILE);
    } else {
        State::new()
            .save(root)
            .context("failed to write state.yaml")?;
        println!("  created: {}", paths::STATE_FILE);
    }

    println!("\nNext: guidepath catalog list");
    Ok(())
}
