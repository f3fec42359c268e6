use crate::output::print_json;
use crate::workspace::Workspace;
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum QuizSubcommand {
    /// Store the quiz result for the active module
    Record {
        /// Score, 0-100
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
        score: u32,
        /// Mark the quiz as passed
        #[arg(long)]
        passed: bool,
    },
}

pub fn run(root: &Path, subcmd: QuizSubcommand, json: bool) -> anyhow::Result<()> {
    let mut ws = Workspace::load(root)?;
    match subcmd {
        QuizSubcommand::Record { score, passed } => {
            let session = ws.active_session()?;
            session
                .record_quiz(passed, score)
                .context("failed to save quiz result")?;
            let module = session.machine().module().id.clone();
            ws.record("quiz", &format!("score={score} passed={passed}"));
            ws.save_state()?;

            if json {
                return print_json(&serde_json::json!({
                    "module": module,
                    "passed": passed,
                    "score": score,
                }));
            }
            let verdict = if passed { "passed" } else { "not passed" };
            println!("Quiz for '{module}': {score} ({verdict})");
            Ok(())
        }
    }
}
