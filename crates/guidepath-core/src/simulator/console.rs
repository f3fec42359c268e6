//! Canned web-console responses for AWS and GitHub.
//!
//! Console platforms have no free-text input. Each module step becomes an
//! affordance whose id is the step's action; pressing it dispatches that id
//! through the same ordered [`RuleTable`] the terminals use.

use super::rules::{command_rule, fake_hex, RuleTable};
use super::state::{ConsoleResource, Deferred, Mutation, SimState};
use super::TerminalLine;
use crate::types::ServiceStatus;
use serde::Serialize;

/// A button or input on a simulated console page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Affordance {
    pub id: String,
    pub label: String,
    /// The one affordance the current step wants pressed.
    pub highlighted: bool,
}

pub const INSTANCE_RUNNING_AT_MS: u64 = 1500;

pub fn rules() -> RuleTable {
    RuleTable::new(vec![
        // -- AWS ------------------------------------------------------------
        command_rule! {
            id: "aws_open_ec2",
            pattern: "aws-open-ec2",
            output: |_, _| vec![
                TerminalLine::output("Console Home › EC2 › Instances", 300),
                TerminalLine::output("Instances (0)  Region: us-east-1", 200),
            ]
        },
        command_rule! {
            id: "aws_choose_ami",
            pattern: "aws-choose-ami",
            output: |_, _| vec![
                TerminalLine::output("Application and OS Images (Amazon Machine Image)", 200),
                TerminalLine::success("Selected: Amazon Linux 2023 AMI (ami-0c101f26f147fa7fd)", 150),
            ]
        },
        command_rule! {
            id: "aws_choose_instance_type",
            pattern: "aws-choose-instance-type",
            output: |_, _| vec![
                TerminalLine::output("Instance type", 150),
                TerminalLine::success("Selected: t3.micro (2 vCPU, 1 GiB memory) Free tier eligible", 150),
            ]
        },
        command_rule! {
            id: "aws_configure_sg",
            pattern: "aws-configure-sg",
            output: |_, _| vec![
                TerminalLine::output("Network settings › Create security group", 200),
                TerminalLine::output("Allow SSH traffic from: My IP", 100),
                TerminalLine::output("Allow HTTP traffic from the internet", 100),
            ],
            effect: |state, _| {
                push_resource(state, "security-group", format!("sg-{}", fake_hex("sg:launch-wizard-1", 17)), ServiceStatus::Running);
                Vec::new()
            }
        },
        command_rule! {
            id: "aws_launch_instance",
            pattern: "aws-launch-instance",
            output: |state, _| {
                let id = instance_id(state);
                vec![
                    TerminalLine::output("Launching instance...", 400),
                    TerminalLine::output("Creating security group rules", 300),
                    TerminalLine::success(format!("Successfully initiated launch of instance ({id})"), 600),
                ]
            },
            effect: |state, _| {
                let id = instance_id(state);
                push_resource(state, "ec2-instance", id.clone(), ServiceStatus::Starting);
                vec![Deferred::at(
                    INSTANCE_RUNNING_AT_MS,
                    Mutation::Console { id, status: ServiceStatus::Running },
                )]
            }
        },
        // -- GitHub ---------------------------------------------------------
        command_rule! {
            id: "github_new_repo",
            pattern: "github-new-repo",
            output: |_, _| vec![
                TerminalLine::output("Create a new repository", 200),
                TerminalLine::output("Owner: learner   Repository name: app   Public", 150),
                TerminalLine::success("Repository learner/app created", 400),
            ],
            effect: |state, _| {
                push_resource(state, "repository", "learner/app".into(), ServiceStatus::Running);
                Vec::new()
            }
        },
        command_rule! {
            id: "github_create_branch",
            pattern: "github-create-branch",
            output: |_, _| vec![
                TerminalLine::output("Find or create a branch...", 150),
                TerminalLine::success("Branch feature/readme created from main", 250),
            ],
            effect: |state, _| {
                push_resource(state, "branch", "feature/readme".into(), ServiceStatus::Running);
                Vec::new()
            }
        },
        command_rule! {
            id: "github_open_pr",
            pattern: "github-open-pr",
            output: |_, _| vec![
                TerminalLine::output("Comparing changes: main ← feature/readme", 250),
                TerminalLine::output("✓ Able to merge. These branches can be automatically merged.", 200),
                TerminalLine::success("Pull request #1 opened", 300),
            ],
            effect: |state, _| {
                push_resource(state, "pull-request", "#1".into(), ServiceStatus::Running);
                Vec::new()
            }
        },
        command_rule! {
            id: "github_merge_pr",
            pattern: "github-merge-pr",
            output: |state, _| {
                if state.console.iter().any(|r| r.id == "#1") {
                    vec![
                        TerminalLine::output("Merge pull request #1 from learner/feature/readme", 300),
                        TerminalLine::success("Pull request successfully merged and closed", 300),
                    ]
                } else {
                    vec![TerminalLine::error("There are no open pull requests to merge", 200)]
                }
            },
            effect: |state, _| {
                // Merged pull requests are closed, not removed.
                if let Some(pr) = state.console.iter_mut().find(|r| r.id == "#1") {
                    pr.status = ServiceStatus::Stopped;
                }
                Vec::new()
            }
        },
        // Catalog files may name console actions this table has no script for.
        command_rule! {
            id: "generic",
            pattern: "",
            output: |_, input| vec![TerminalLine::success(format!("✓ {input}"), 200)]
        },
    ])
}

fn push_resource(state: &mut SimState, kind: &str, id: String, status: ServiceStatus) {
    if state.console.iter().any(|r| r.id == id) {
        return;
    }
    state.console.push(ConsoleResource {
        kind: kind.to_string(),
        id,
        status,
    });
}

fn instance_id(state: &SimState) -> String {
    let n = state
        .console
        .iter()
        .filter(|r| r.kind == "ec2-instance")
        .count();
    format!("i-{}", fake_hex(&format!("instance:{n}"), 17))
}
