mod bridge;
mod cmd;
mod driver;
mod output;
mod root;
mod workspace;

use clap::{Parser, Subcommand};
use cmd::{
    catalog::CatalogSubcommand, config::ConfigSubcommand, gate::GateSubcommand,
    mentor::MentorSubcommand, module::ModuleSubcommand, quiz::QuizSubcommand,
    sim::SimSubcommand, step::StepSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "guidepath",
    about = "Guided workflow lessons with a simulated terminal and cloud console",
    version,
    propagate_version = true
)]
struct Cli {
    /// Workspace root (default: auto-detect from .guidepath/)
    #[arg(long, global = true, env = "GUIDEPATH_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .guidepath/ with a fresh learner id
    Init,

    /// Browse categories, modules and steps
    Catalog {
        #[command(subcommand)]
        subcommand: CatalogSubcommand,
    },

    /// Start or switch the active module
    Module {
        #[command(subcommand)]
        subcommand: ModuleSubcommand,
    },

    /// Show the active module, its steps and the plan limit
    Status,

    /// Complete or jump between steps of the active module
    Step {
        #[command(subcommand)]
        subcommand: StepSubcommand,
    },

    /// Drive the simulated terminal or console
    Sim {
        #[command(subcommand)]
        subcommand: SimSubcommand,
    },

    /// Record a quiz result for the active module
    Quiz {
        #[command(subcommand)]
        subcommand: QuizSubcommand,
    },

    /// Inspect the free plan limit
    Gate {
        #[command(subcommand)]
        subcommand: GateSubcommand,
    },

    /// Ask the mentor about the current step
    Mentor {
        #[command(subcommand)]
        subcommand: MentorSubcommand,
    },

    /// Show or validate the workspace configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Sim {
            subcommand: SimSubcommand::Shell,
        }
        | Commands::Mentor { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Catalog { subcommand } => cmd::catalog::run(&root, subcommand, cli.json),
        Commands::Module { subcommand } => cmd::module::run(&root, subcommand, cli.json),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Step { subcommand } => cmd::step::run(&root, subcommand, cli.json),
        Commands::Sim { subcommand } => cmd::sim::run(&root, subcommand, cli.json),
        Commands::Quiz { subcommand } => cmd::quiz::run(&root, subcommand, cli.json),
        Commands::Gate { subcommand } => cmd::gate::run(&root, subcommand, cli.json),
        Commands::Mentor { subcommand } => cmd::mentor::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
