use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuideError {
    #[error("not initialized: run 'guidepath init'")]
    NotInitialized,

    #[error("no active module: run 'guidepath module start <category> <module>'")]
    NoActiveModule,

    #[error("category not found: {0}")]
    CategoryNotFound(String),

    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error("module '{module}' does not belong to category '{category}'")]
    ModuleNotInCategory { category: String, module: String },

    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("simulator is busy: wait for the current command to finish")]
    SimulatorBusy,

    #[error("simulator is not open")]
    SimulatorClosed,

    #[error("platform '{0}' has no free-text terminal; use the console affordances")]
    ConsoleOnly(String),

    #[error("platform '{0}' has no console affordances; type commands instead")]
    TerminalOnly(String),

    #[error("unknown affordance: {0}")]
    UnknownAffordance(String),

    #[error("quiz for '{0}' unlocks once every step is complete")]
    QuizNotAvailable(String),

    #[error("workflow limit reached for the free plan: upgrade to continue")]
    UpgradeRequired,

    #[error("completion ledger error: {0}")]
    Ledger(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GuideError>;
