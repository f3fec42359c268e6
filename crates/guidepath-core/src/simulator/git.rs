use super::rules::{command_rule, fake_hex, flag_value, positionals, words, RuleTable};
use super::state::{Commit, SimState};
use super::TerminalLine;

pub const EXPECTED: &[(&str, &str)] = &[
    ("git-init", "git init"),
    ("git-add", "git add ."),
    ("git-commit", "git commit -m \"Initial commit\""),
    (
        "git-remote",
        "git remote add origin https://github.com/learner/app.git",
    ),
    ("git-push", "git push -u origin main"),
];

const NOT_A_REPO: &str = "fatal: not a git repository (or any of the parent directories): .git";

pub fn rules() -> RuleTable {
    RuleTable::new(vec![
        command_rule! {
            id: "init",
            pattern: "git init",
            output: |state, _| {
                let verb = if state.repo.initialized { "Reinitialized existing" } else { "Initialized empty" };
                vec![TerminalLine::output(
                    format!("{verb} Git repository in /home/learner/app/.git/"),
                    150,
                )]
            },
            effect: |state, _| {
                if !state.repo.initialized {
                    state.repo.initialized = true;
                    state.repo.branch = "main".into();
                    state.repo.branches = vec!["main".into()];
                }
                Vec::new()
            }
        },
        command_rule! {
            id: "status",
            pattern: "git status",
            output: status
        },
        command_rule! {
            id: "add",
            pattern: "git add",
            output: |state, input| {
                if !state.repo.initialized {
                    return vec![TerminalLine::error(NOT_A_REPO, 80)];
                }
                match pathspecs(input).first() {
                    None => vec![
                        TerminalLine::output("Nothing specified, nothing added.", 80),
                        TerminalLine::output("hint: Maybe you wanted to say 'git add .'?", 20),
                    ],
                    Some(_) => Vec::new(),
                }
            },
            effect: |state, input| {
                if !state.repo.initialized {
                    return Vec::new();
                }
                let specs = pathspecs(input);
                let repo = &mut state.repo;
                let (take, keep): (Vec<String>, Vec<String>) = repo
                    .untracked
                    .drain(..)
                    .partition(|f| specs.iter().any(|s| s == "." || s == f));
                repo.untracked = keep;
                repo.staged.extend(take);
                repo.staged.sort();
                Vec::new()
            }
        },
        command_rule! {
            id: "commit",
            pattern: "git commit",
            output: commit,
            effect: |state, input| {
                let Some(message) = commit_message(input) else {
                    return Vec::new();
                };
                if !state.repo.initialized || state.repo.staged.is_empty() {
                    return Vec::new();
                }
                let hash = next_hash(state, &message);
                let repo = &mut state.repo;
                let files = std::mem::take(&mut repo.staged);
                repo.commits.push(Commit {
                    hash,
                    branch: repo.branch.clone(),
                    message,
                    files,
                });
                Vec::new()
            }
        },
        command_rule! {
            id: "checkout_new",
            pattern: "git checkout -b",
            output: |state, input| {
                if !state.repo.initialized {
                    return vec![TerminalLine::error(NOT_A_REPO, 80)];
                }
                match positionals(input, 3, &[]).first() {
                    Some(b) if state.repo.branches.contains(b) => vec![TerminalLine::error(
                        format!("fatal: a branch named '{b}' already exists"),
                        80,
                    )],
                    Some(b) => vec![TerminalLine::output(
                        format!("Switched to a new branch '{b}'"),
                        80,
                    )],
                    None => vec![TerminalLine::error(
                        "error: switch `b' requires a value",
                        80,
                    )],
                }
            },
            effect: |state, input| {
                if let Some(b) = positionals(input, 3, &[]).into_iter().next() {
                    let repo = &mut state.repo;
                    if repo.initialized && !repo.branches.contains(&b) {
                        repo.branches.push(b.clone());
                        repo.branch = b;
                    }
                }
                Vec::new()
            }
        },
        command_rule! {
            id: "checkout",
            pattern: "git checkout",
            output: |state, input| {
                if !state.repo.initialized {
                    return vec![TerminalLine::error(NOT_A_REPO, 80)];
                }
                match positionals(input, 2, &[]).first() {
                    Some(b) if state.repo.branches.contains(b) => vec![TerminalLine::output(
                        format!("Switched to branch '{b}'"),
                        80,
                    )],
                    Some(b) => vec![TerminalLine::error(
                        format!("error: pathspec '{b}' did not match any file(s) known to git"),
                        80,
                    )],
                    None => vec![TerminalLine::output(
                        format!("Your branch is up to date with 'origin/{}'.", state.repo.branch),
                        80,
                    )],
                }
            },
            effect: |state, input| {
                if let Some(b) = positionals(input, 2, &[]).into_iter().next() {
                    if state.repo.branches.contains(&b) {
                        state.repo.branch = b;
                    }
                }
                Vec::new()
            }
        },
        command_rule! {
            id: "branch",
            pattern: "git branch",
            output: |state, _| {
                if !state.repo.initialized {
                    return vec![TerminalLine::error(NOT_A_REPO, 80)];
                }
                state
                    .repo
                    .branches
                    .iter()
                    .map(|b| {
                        let mark = if *b == state.repo.branch { "*" } else { " " };
                        TerminalLine::output(format!("{mark} {b}"), 40)
                    })
                    .collect()
            }
        },
        command_rule! {
            id: "remote_add",
            pattern: "git remote add",
            output: |state, input| {
                if !state.repo.initialized {
                    return vec![TerminalLine::error(NOT_A_REPO, 80)];
                }
                match positionals(input, 3, &[]).as_slice() {
                    [name, _] if state.repo.remotes.contains_key(name) => vec![
                        TerminalLine::error(format!("error: remote {name} already exists."), 80),
                    ],
                    [_, _] => Vec::new(),
                    _ => vec![TerminalLine::error(
                        "usage: git remote add <name> <url>",
                        80,
                    )],
                }
            },
            effect: |state, input| {
                if let [name, url] = positionals(input, 3, &[]).as_slice() {
                    if state.repo.initialized {
                        state
                            .repo
                            .remotes
                            .entry(name.clone())
                            .or_insert_with(|| url.clone());
                    }
                }
                Vec::new()
            }
        },
        command_rule! {
            id: "remote",
            pattern: "git remote",
            output: |state, input| {
                if !state.repo.initialized {
                    return vec![TerminalLine::error(NOT_A_REPO, 80)];
                }
                let verbose = words(input).iter().any(|w| w == "-v");
                state
                    .repo
                    .remotes
                    .iter()
                    .flat_map(|(name, url)| {
                        if verbose {
                            vec![
                                TerminalLine::output(format!("{name}\t{url} (fetch)"), 40),
                                TerminalLine::output(format!("{name}\t{url} (push)"), 10),
                            ]
                        } else {
                            vec![TerminalLine::output(name.clone(), 40)]
                        }
                    })
                    .collect()
            }
        },
        command_rule! {
            id: "push",
            pattern: "git push",
            output: push,
            effect: |state, input| {
                if let Some((remote, branch)) = push_target(state, input) {
                    let key = format!("{remote}/{branch}");
                    if !state.repo.upstream.contains(&key) {
                        state.repo.upstream.push(key);
                    }
                }
                Vec::new()
            }
        },
        command_rule! {
            id: "log",
            pattern: "git log",
            output: log
        },
        command_rule! {
            id: "version",
            pattern: "git --version",
            output: |_, _| vec![TerminalLine::output("git version 2.43.0", 100)]
        },
        command_rule! {
            id: "help",
            pattern: "help",
            output: |_, _| super::help_lines(EXPECTED)
        },
    ])
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn pathspecs(input: &str) -> Vec<String> {
    positionals(input, 2, &[])
}

fn commit_message(input: &str) -> Option<String> {
    flag_value(input, "-m").or_else(|| flag_value(input, "--message"))
}

/// Hash for the next commit, derived from its position and message.
fn next_hash(state: &SimState, message: &str) -> String {
    fake_hex(
        &format!("commit:{}:{message}", state.repo.commits.len()),
        40,
    )
}

fn status(state: &SimState, _: &str) -> Vec<TerminalLine> {
    let repo = &state.repo;
    if !repo.initialized {
        return vec![TerminalLine::error(NOT_A_REPO, 80)];
    }
    let mut lines = vec![TerminalLine::output(format!("On branch {}", repo.branch), 80)];
    if repo.commits.is_empty() {
        lines.push(TerminalLine::output("", 0));
        lines.push(TerminalLine::output("No commits yet", 0));
    }
    if !repo.staged.is_empty() {
        lines.push(TerminalLine::output("", 0));
        lines.push(TerminalLine::output("Changes to be committed:", 20));
        for f in &repo.staged {
            lines.push(TerminalLine::success(format!("\tnew file:   {f}"), 10));
        }
    }
    if !repo.untracked.is_empty() {
        lines.push(TerminalLine::output("", 0));
        lines.push(TerminalLine::output("Untracked files:", 20));
        for f in &repo.untracked {
            lines.push(TerminalLine::error(format!("\t{f}"), 10));
        }
    }
    if repo.staged.is_empty() && repo.untracked.is_empty() {
        lines.push(TerminalLine::output(
            "nothing to commit, working tree clean",
            20,
        ));
    }
    lines
}

fn commit(state: &SimState, input: &str) -> Vec<TerminalLine> {
    let repo = &state.repo;
    if !repo.initialized {
        return vec![TerminalLine::error(NOT_A_REPO, 80)];
    }
    let Some(message) = commit_message(input) else {
        return vec![TerminalLine::error(
            "Aborting commit due to empty commit message.",
            120,
        )];
    };
    if repo.staged.is_empty() {
        return vec![TerminalLine::output(
            "nothing added to commit but untracked files present (use \"git add\" to track)",
            120,
        )];
    }
    let hash = next_hash(state, &message);
    let root = if repo.commits.is_empty() {
        " (root-commit)"
    } else {
        ""
    };
    let n = repo.staged.len();
    let plural = if n == 1 { "" } else { "s" };
    let mut lines = vec![
        TerminalLine::output(format!("[{}{root} {}] {message}", repo.branch, &hash[..7]), 200),
        TerminalLine::output(format!(" {n} file{plural} changed, {} insertions(+)", n * 12), 60),
    ];
    for f in &repo.staged {
        lines.push(TerminalLine::output(
            format!(" create mode 100644 {f}"),
            20,
        ));
    }
    lines
}

/// `(remote, branch)` a push would update, if the push is valid.
fn push_target(state: &SimState, input: &str) -> Option<(String, String)> {
    let repo = &state.repo;
    if !repo.initialized {
        return None;
    }
    let args = positionals(input, 2, &[]);
    let remote = args.first().cloned().unwrap_or_else(|| "origin".into());
    let branch = args.get(1).cloned().unwrap_or_else(|| repo.branch.clone());
    if !repo.remotes.contains_key(&remote)
        || !repo.branches.contains(&branch)
        || repo.commits_on(&branch).is_empty()
    {
        return None;
    }
    Some((remote, branch))
}

fn push(state: &SimState, input: &str) -> Vec<TerminalLine> {
    let repo = &state.repo;
    if !repo.initialized {
        return vec![TerminalLine::error(NOT_A_REPO, 80)];
    }
    let args = positionals(input, 2, &[]);
    let remote = args.first().cloned().unwrap_or_else(|| "origin".into());
    let Some(url) = repo.remotes.get(&remote) else {
        return vec![
            TerminalLine::error(
                format!("fatal: '{remote}' does not appear to be a git repository"),
                300,
            ),
            TerminalLine::error("fatal: Could not read from remote repository.", 20),
        ];
    };
    let Some((_, branch)) = push_target(state, input) else {
        let branch = args.get(1).cloned().unwrap_or_else(|| repo.branch.clone());
        return vec![
            TerminalLine::error(format!("error: src refspec {branch} does not match any"), 300),
            TerminalLine::error(format!("error: failed to push some refs to '{url}'"), 20),
        ];
    };
    let n = repo.commits_on(&branch).len();
    let mut lines = vec![
        TerminalLine::output(format!("Enumerating objects: {}, done.", n * 6), 300),
        TerminalLine::output(format!("Writing objects: 100% ({0}/{0}), 1.21 KiB, done.", n * 6), 400),
        TerminalLine::output(format!("To {url}"), 200),
        TerminalLine::output(format!(" * [new branch]      {branch} -> {branch}"), 100),
    ];
    let tracking = words(input)
        .iter()
        .any(|w| w == "-u" || w == "--set-upstream");
    if tracking {
        lines.push(TerminalLine::success(
            format!("branch '{branch}' set up to track '{remote}/{branch}'."),
            50,
        ));
    }
    lines
}

fn log(state: &SimState, input: &str) -> Vec<TerminalLine> {
    let repo = &state.repo;
    if !repo.initialized {
        return vec![TerminalLine::error(NOT_A_REPO, 80)];
    }
    let commits = repo.commits_on(&repo.branch);
    if commits.is_empty() {
        return vec![TerminalLine::error(
            format!(
                "fatal: your current branch '{}' does not have any commits yet",
                repo.branch
            ),
            80,
        )];
    }
    let oneline = words(input).iter().any(|w| w == "--oneline");
    let mut lines = Vec::new();
    for (i, c) in commits.iter().rev().enumerate() {
        let head = if i == 0 {
            format!(" (HEAD -> {})", repo.branch)
        } else {
            String::new()
        };
        if oneline {
            lines.push(TerminalLine::output(format!("{}{head} {}", c.short(), c.message), 40));
        } else {
            lines.push(TerminalLine::output(format!("commit {}{head}", c.hash), 60));
            lines.push(TerminalLine::output("Author: Learner <learner@example.com>", 0));
            lines.push(TerminalLine::output("", 0));
            lines.push(TerminalLine::output(format!("    {}", c.message), 0));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LineKind, Platform};

    fn run(state: &mut SimState, input: &str) -> Vec<TerminalLine> {
        rules().dispatch(state, input).lines
    }

    fn walk(state: &mut SimState) {
        for (_, command) in EXPECTED {
            run(state, command);
        }
    }

    #[test]
    fn commands_fail_outside_a_repo() {
        let mut state = SimState::for_platform(Platform::Git);
        for cmd in ["git status", "git add .", "git log", "git branch"] {
            let lines = run(&mut state, cmd);
            assert_eq!(lines[0].text, NOT_A_REPO, "{cmd}");
        }
        assert!(state.repo.staged.is_empty());
    }

    #[test]
    fn checkout_b_is_not_shadowed() {
        let table = rules();
        assert_eq!(table.find("git checkout -b feature").unwrap().id, "checkout_new");
        assert_eq!(table.find("git checkout main").unwrap().id, "checkout");
        assert_eq!(table.find("git remote add origin x").unwrap().id, "remote_add");
        assert_eq!(table.find("git remote -v").unwrap().id, "remote");
    }

    #[test]
    fn full_first_commit_walkthrough() {
        let mut state = SimState::for_platform(Platform::Git);
        walk(&mut state);
        let repo = &state.repo;
        assert!(repo.initialized);
        assert!(repo.untracked.is_empty());
        assert!(repo.staged.is_empty());
        assert_eq!(repo.commits.len(), 1);
        assert_eq!(repo.commits[0].message, "Initial commit");
        assert_eq!(repo.commits[0].files.len(), 4);
        assert_eq!(
            repo.remotes.get("origin").map(String::as_str),
            Some("https://github.com/learner/app.git")
        );
        assert_eq!(repo.upstream, vec!["origin/main".to_string()]);
    }

    #[test]
    fn commit_output_matches_recorded_hash() {
        let mut state = SimState::for_platform(Platform::Git);
        run(&mut state, "git init");
        run(&mut state, "git add .");
        let lines = run(&mut state, "git commit -m \"Initial commit\"");
        let short = state.repo.commits[0].short().to_string();
        assert!(lines[0].text.contains(&short));
        assert!(lines[0].text.contains("root-commit"));
    }

    #[test]
    fn commit_with_nothing_staged_changes_nothing() {
        let mut state = SimState::for_platform(Platform::Git);
        run(&mut state, "git init");
        let lines = run(&mut state, "git commit -m wip");
        assert!(lines[0].text.contains("nothing added"));
        assert!(state.repo.commits.is_empty());
    }

    #[test]
    fn add_single_file() {
        let mut state = SimState::for_platform(Platform::Git);
        run(&mut state, "git init");
        run(&mut state, "git add README.md");
        assert_eq!(state.repo.staged, vec!["README.md".to_string()]);
        assert_eq!(state.repo.untracked.len(), 3);
    }

    #[test]
    fn push_without_remote_fails() {
        let mut state = SimState::for_platform(Platform::Git);
        run(&mut state, "git init");
        run(&mut state, "git add .");
        run(&mut state, "git commit -m first");
        let lines = run(&mut state, "git push -u origin main");
        assert!(lines.iter().all(|l| l.kind == LineKind::Error));
        assert!(state.repo.upstream.is_empty());
    }

    #[test]
    fn branches_and_log() {
        let mut state = SimState::for_platform(Platform::Git);
        walk(&mut state);
        run(&mut state, "git checkout -b feature");
        assert_eq!(state.repo.branch, "feature");
        let lines = run(&mut state, "git branch");
        assert_eq!(lines[0].text, "  main");
        assert_eq!(lines[1].text, "* feature");
        run(&mut state, "git checkout main");
        let log = run(&mut state, "git log --oneline");
        assert_eq!(log.len(), 1);
        assert!(log[0].text.ends_with("Initial commit"));
    }
}
