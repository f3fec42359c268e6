use anyhow::Context;
use guidepath_core::{
    catalog::Catalog,
    config::Config,
    gate::{FreemiumGate, RedbLedger},
    paths,
    progress::{FileProgressStore, ProgressStore},
    session::LearningSession,
    state::State,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a command needs from `.guidepath/`, loaded once per invocation.
pub struct Workspace {
    pub root: PathBuf,
    pub config: Config,
    pub catalog: Arc<Catalog>,
    pub state: State,
}

impl Workspace {
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let config = Config::load(root).context("failed to load config")?;
        let state = State::load(root).context("failed to load state")?;
        let catalog = Catalog::load(root).context("failed to load catalog")?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
            catalog: Arc::new(catalog),
            state,
        })
    }

    pub fn store(&self) -> Arc<dyn ProgressStore> {
        Arc::new(FileProgressStore::new(&self.root))
    }

    pub fn gate(&self) -> anyhow::Result<FreemiumGate> {
        let ledger = RedbLedger::open(&paths::ledger_path(&self.root))
            .context("failed to open completion ledger")?;
        Ok(FreemiumGate::new(
            Arc::new(ledger),
            self.config.plan.tier,
            self.config.plan.free_workflow_limit,
            self.config.learner.id.clone(),
        ))
    }

    /// Session for `(category, module)`, running the mount-time gate check.
    pub fn session_for(&self, category: &str, module: &str) -> anyhow::Result<LearningSession> {
        let session = LearningSession::start(
            self.catalog.clone(),
            self.store(),
            self.gate()?,
            category,
            module,
        )
        .with_context(|| format!("failed to open module '{module}'"))?;
        Ok(session)
    }

    /// Session for the module recorded as active in `state.yaml`.
    pub fn active_session(&self) -> anyhow::Result<LearningSession> {
        let (category, module) = self.state.require_active()?;
        self.session_for(category, module)
    }

    pub fn record(&mut self, action: &str, detail: &str) {
        let module = self
            .state
            .active
            .as_ref()
            .map(|a| a.module.clone())
            .unwrap_or_default();
        self.state.record(&module, action, detail);
    }

    pub fn save_state(&self) -> anyhow::Result<()> {
        self.state
            .save(&self.root)
            .context("failed to write state.yaml")
    }
}
