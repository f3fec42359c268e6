use crate::bridge;
use crate::output::print_json;
use crate::workspace::Workspace;
use anyhow::Context;
use clap::Subcommand;
use futures::future::AbortHandle;
use guidepath_core::{io, paths};
use mentor_agent::{ChatMessage, Conversation, MentorClient, TurnOutcome};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Subcommand)]
pub enum MentorSubcommand {
    /// Ask a question about the current step; the reply streams as it arrives
    Ask {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        question: Vec<String>,
    },
}

#[derive(Serialize)]
struct Answer<'a> {
    question: &'a str,
    outcome: &'static str,
    reply: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

pub fn run(root: &Path, subcmd: MentorSubcommand, json: bool) -> anyhow::Result<()> {
    let mut ws = Workspace::load(root)?;
    match subcmd {
        MentorSubcommand::Ask { question } => {
            let question = question.join(" ");
            let session = ws.active_session()?;
            let context = bridge::mentor_context(&session.snapshot());
            let history = paths::mentor_history_path(
                root,
                session.machine().category_id(),
                &session.machine().module().id,
            );
            drop(session);

            let mentor = &ws.config.mentor;
            let api_key = std::env::var(&mentor.api_key_env).ok();
            let client = MentorClient::new(mentor.endpoint.clone()).with_api_key(api_key);
            let mut conversation = load_history(&history)?;
            let request = conversation.begin_turn(question.clone(), context, mentor.model.clone());

            let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            let outcome = rt.block_on(async {
                let (handle, registration) = AbortHandle::new_pair();
                // Ctrl-C closes the panel: the turn is dropped, not failed.
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        handle.abort();
                    }
                });
                client
                    .ask(&request, registration, |fragment| {
                        conversation.push_fragment(fragment);
                        if !json {
                            print!("{fragment}");
                            std::io::stdout().flush().ok();
                        }
                    })
                    .await
            });
            conversation.finish_turn(&outcome);
            save_history(&history, &conversation, &outcome)?;
            ws.record("mentor", &question);
            ws.save_state()?;

            let reply = conversation
                .messages()
                .last()
                .filter(|_| !matches!(outcome, TurnOutcome::Aborted))
                .map(|m| m.content.as_str());
            let (label, error) = match &outcome {
                TurnOutcome::Completed(_) => ("completed", None),
                TurnOutcome::Aborted => ("aborted", None),
                TurnOutcome::Failed { error, .. } => ("failed", Some(error.as_str())),
            };

            if json {
                return print_json(&Answer {
                    question: &question,
                    outcome: label,
                    reply,
                    error,
                });
            }
            match &outcome {
                TurnOutcome::Completed(_) => println!(),
                TurnOutcome::Aborted => println!("\n(cancelled)"),
                TurnOutcome::Failed { apology, .. } => println!("{apology}"),
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

fn load_history(path: &Path) -> anyhow::Result<Conversation> {
    let messages: Option<Vec<ChatMessage>> =
        io::read_yaml(path).context("failed to read mentor history")?;
    Ok(Conversation::from_messages(messages.unwrap_or_default()))
}

/// An aborted turn leaves the saved history as it was.
fn save_history(
    path: &Path,
    conversation: &Conversation,
    outcome: &TurnOutcome,
) -> anyhow::Result<()> {
    if matches!(outcome, TurnOutcome::Aborted) {
        return Ok(());
    }
    io::write_yaml(path, &conversation.messages()).context("failed to write mentor history")
}
