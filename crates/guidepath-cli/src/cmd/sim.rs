use crate::driver::{self, Pacing, Played};
use crate::output::{format_line, print_events, print_json, print_lines, print_table};
use crate::workspace::Workspace;
use anyhow::Context;
use clap::Subcommand;
use guidepath_core::config::Config;
use guidepath_core::error::GuideError;
use guidepath_core::session::{LearningSession, SessionEvent};
use guidepath_core::simulator::TerminalLine;
use guidepath_core::types::LineKind;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Subcommand)]
pub enum SimSubcommand {
    /// Run one command in a fresh simulated terminal
    Run {
        /// The command line, e.g. `git init`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
        /// Print the transcript without waiting out the output delays
        #[arg(long)]
        instant: bool,
    },
    /// Interactive terminal (or console) session on stdin; `exit` to leave
    Shell,
    /// List the console affordances for the current step
    Console,
    /// Press a console affordance
    Select {
        /// Affordance id, as listed by `guidepath sim console`
        affordance: String,
        /// Print the transcript without waiting out the output delays
        #[arg(long)]
        instant: bool,
    },
}

pub fn run(root: &Path, subcmd: SimSubcommand, json: bool) -> anyhow::Result<()> {
    let mut ws = Workspace::load(root)?;
    let mut session = ws.active_session()?;
    let config = ws.config.clone();

    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let result = match subcmd {
        SimSubcommand::Run { command, instant } => {
            let command = command.join(" ");
            let result = rt.block_on(run_once(
                &mut session,
                Pacing::new(&config, instant),
                &command,
                json,
            ));
            ws.record("command", &command);
            result
        }
        SimSubcommand::Select {
            affordance,
            instant,
        } => {
            let result = rt.block_on(select_once(
                &mut session,
                Pacing::new(&config, instant),
                &affordance,
                json,
            ));
            ws.record("select", &affordance);
            result
        }
        SimSubcommand::Console => console(&mut session, json),
        SimSubcommand::Shell => rt.block_on(shell(&mut session, &mut ws, &config)),
    };
    session.close_simulator();
    ws.save_state()?;
    result
}

// ---------------------------------------------------------------------------
// run / select
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Transcript {
    lines: Vec<TerminalLine>,
    events: Vec<SessionEvent>,
}

async fn run_once(
    session: &mut LearningSession,
    pacing: Pacing<'_>,
    command: &str,
    json: bool,
) -> anyhow::Result<()> {
    let prompt = session.machine().module().platform.prompt();
    session.open_simulator()?;
    session.submit(command)?;
    let played = driver::play_foreground(session, pacing, |line| {
        if !json {
            println!("{}", format_line(prompt, line));
        }
    })
    .await;
    report(session, played, json)
}

async fn select_once(
    session: &mut LearningSession,
    pacing: Pacing<'_>,
    affordance: &str,
    json: bool,
) -> anyhow::Result<()> {
    let prompt = session.machine().module().platform.prompt();
    session.open_simulator()?;
    if !session.select(affordance)? {
        if json {
            return print_json(&Transcript {
                lines: Vec::new(),
                events: Vec::new(),
            });
        }
        println!("'{affordance}' is not highlighted for this step; nothing happened");
        return Ok(());
    }
    let played = driver::play_foreground(session, pacing, |line| {
        if !json {
            println!("{}", format_line(prompt, line));
        }
    })
    .await;
    report(session, played, json)
}

fn report(session: &LearningSession, played: Played, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&Transcript {
            lines: played.lines,
            events: played.events,
        });
    }
    print_events(&played.events);
    print_next_step(session);
    Ok(())
}

fn print_next_step(session: &LearningSession) {
    let machine = session.machine();
    if machine.is_done() {
        return;
    }
    let step = machine.current_step();
    println!(
        "Step {}/{}: {}",
        machine.current_index() + 1,
        machine.module().steps.len(),
        step.title
    );
}

// ---------------------------------------------------------------------------
// console
// ---------------------------------------------------------------------------

fn console(session: &mut LearningSession, json: bool) -> anyhow::Result<()> {
    let action = session.machine().current_step().action.clone();
    // Inside `sim shell` the open console keeps its state.
    if session.simulator().is_none() {
        session.open_simulator()?;
    }
    let affordances = session
        .simulator()
        .ok_or(GuideError::SimulatorClosed)?
        .affordances(Some(&action))?;
    if json {
        return print_json(&affordances);
    }
    print_table(
        &["", "ID", "LABEL"],
        affordances
            .iter()
            .map(|a| {
                vec![
                    if a.highlighted { "→" } else { " " }.to_string(),
                    a.id.clone(),
                    a.label.clone(),
                ]
            })
            .collect(),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// shell
// ---------------------------------------------------------------------------

async fn shell(
    session: &mut LearningSession,
    ws: &mut Workspace,
    config: &Config,
) -> anyhow::Result<()> {
    let pacing = Pacing::new(config, false);
    let platform = session.machine().module().platform;
    let prompt = platform.prompt();
    session.open_simulator()?;
    tracing::info!(platform = %platform, "simulator opened");

    println!("{} ({platform}). Type 'exit' to leave.", session.machine().module().name);
    print_next_step(session);
    if platform.is_console() {
        println!("Press an affordance by id; an empty line lists them.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{prompt} ");
        std::io::stdout().flush().ok();

        // Background timers keep firing while the learner is typing.
        let input = loop {
            let wait = driver::until_next_timer(session, pacing);
            tokio::select! {
                line = lines.next_line() => break line.context("failed to read stdin")?,
                _ = sleep_or_pending(wait) => {
                    print_events(&driver::fire_background(session));
                }
            }
        };
        let Some(input) = input else {
            println!();
            break;
        };
        let input = input.trim().to_string();
        if input == "exit" || input == "quit" {
            break;
        }

        let accepted = if platform.is_console() {
            if input.is_empty() {
                console(session, false)?;
                continue;
            }
            ws.record("select", &input);
            match session.select(&input) {
                Ok(true) => true,
                Ok(false) => {
                    println!("'{input}' is not highlighted for this step");
                    false
                }
                Err(e @ GuideError::UnknownAffordance(_)) => {
                    println!("{e}");
                    false
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            if !input.is_empty() {
                ws.record("command", &input);
            }
            session.submit(&input)?;
            true
        };
        if !accepted {
            continue;
        }

        // The learner already sees what they typed.
        let played = driver::play_foreground(session, pacing, |line| {
            if line.kind != LineKind::Input {
                print_lines(prompt, std::slice::from_ref(line));
            }
        })
        .await;
        print_events(&played.events);
        if played.events.contains(&SessionEvent::UpgradeRequired) {
            break;
        }
        if played
            .events
            .iter()
            .any(|e| matches!(e, SessionEvent::Advanced { .. }))
        {
            print_next_step(session);
        }
    }

    session.close_simulator();
    tracing::info!("simulator closed");
    Ok(())
}

async fn sleep_or_pending(wait: Option<Duration>) {
    match wait {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}
