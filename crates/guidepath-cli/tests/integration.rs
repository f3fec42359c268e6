#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn guidepath(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("guidepath").unwrap();
    cmd.current_dir(dir.path())
        .env("GUIDEPATH_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn init_workspace(dir: &TempDir) {
    guidepath(dir).arg("init").assert().success();
}

fn start(dir: &TempDir, category: &str, module: &str) {
    guidepath(dir)
        .args(["module", "start", category, module])
        .assert()
        .success();
}

fn run_instant(dir: &TempDir, command: &str) -> assert_cmd::assert::Assert {
    let mut args = vec!["sim", "run", "--instant", "--"];
    args.extend(command.split(' '));
    guidepath(dir).args(args).assert()
}

fn status_json(dir: &TempDir) -> serde_json::Value {
    let out = guidepath(dir)
        .args(["status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&out).unwrap()
}

fn point_mentor_at(dir: &TempDir, url: &str) {
    let path = dir.path().join(".guidepath/config.yaml");
    let yaml = std::fs::read_to_string(&path)
        .unwrap()
        .replace("http://localhost:3000/api/assistant", url);
    std::fs::write(&path, yaml).unwrap();
}

const GIT_COMMANDS: &[&str] = &[
    "git init",
    "git add .",
    "git commit -m \"Initial commit\"",
    "git remote add origin https://github.com/learner/app.git",
    "git push -u origin main",
];

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_workspace() {
    let dir = TempDir::new().unwrap();
    guidepath(&dir).arg("init").assert().success();

    assert!(dir.path().join(".guidepath").is_dir());
    assert!(dir.path().join(".guidepath/progress").is_dir());
    assert!(dir.path().join(".guidepath/config.yaml").exists());
    assert!(dir.path().join(".guidepath/state.yaml").exists());
}

#[test]
fn init_is_idempotent_and_keeps_learner_id() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    let before = std::fs::read_to_string(dir.path().join(".guidepath/config.yaml")).unwrap();
    guidepath(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:"));
    let after = std::fs::read_to_string(dir.path().join(".guidepath/config.yaml")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn commands_before_init_fail() {
    let dir = TempDir::new().unwrap();
    guidepath(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

// ---------------------------------------------------------------------------
// catalog
// ---------------------------------------------------------------------------

#[test]
fn catalog_list_works_before_init() {
    let dir = TempDir::new().unwrap();
    guidepath(&dir)
        .args(["catalog", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("git-first-commit"))
        .stdout(predicate::str::contains("ec2-launch"));
}

#[test]
fn catalog_show_lists_steps() {
    let dir = TempDir::new().unwrap();
    guidepath(&dir)
        .args(["catalog", "show", "docker-compose-basics"])
        .assert()
        .success()
        .stdout(predicate::str::contains("docker-compose up -d"))
        .stdout(predicate::str::contains("guidepath module start containers"));
}

#[test]
fn catalog_show_unknown_module_fails() {
    let dir = TempDir::new().unwrap();
    guidepath(&dir)
        .args(["catalog", "show", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("module not found"));
}

// ---------------------------------------------------------------------------
// module / status / step
// ---------------------------------------------------------------------------

#[test]
fn status_needs_active_module() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    guidepath(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no active module"));
}

#[test]
fn module_start_rejects_wrong_category() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    guidepath(&dir)
        .args(["module", "start", "cloud", "git-first-commit"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not belong"));
}

#[test]
fn module_start_creates_progress() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "version-control", "git-first-commit");

    assert!(dir
        .path()
        .join(".guidepath/progress/version-control/git-first-commit.yaml")
        .exists());
    let status = status_json(&dir);
    assert_eq!(status["module"], "git-first-commit");
    assert_eq!(status["steps"].as_array().unwrap().len(), 5);
    assert_eq!(status["steps"][0]["current"], true);
    assert_eq!(status["gate"]["allowed"], true);
}

#[test]
fn step_complete_advances_only_on_match() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "containers", "docker-images");

    guidepath(&dir)
        .args(["step", "complete", "docker-ps"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing changed"));
    guidepath(&dir)
        .args(["step", "complete", "docker-build"])
        .assert()
        .success()
        .stdout(predicate::str::contains("step 'build-image' completed"));

    let status = status_json(&dir);
    assert_eq!(status["steps"][0]["completed"], true);
    assert_eq!(status["steps"][1]["current"], true);
}

#[test]
fn step_complete_on_finished_module_says_already_complete() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "containers", "docker-images");
    for action in ["docker-build", "docker-images", "docker-run", "docker-ps"] {
        guidepath(&dir)
            .args(["step", "complete", action])
            .assert()
            .success();
    }

    guidepath(&dir)
        .args(["step", "complete", "docker-ps"])
        .assert()
        .success()
        .stdout(predicate::str::contains("'docker-ps' is already complete"))
        .stdout(predicate::str::contains("not the current step's action").not());
}

#[test]
fn step_goto_is_clamped() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "containers", "docker-images");
    guidepath(&dir)
        .args(["step", "goto", "99"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Step 4/4"));
}

// ---------------------------------------------------------------------------
// sim
// ---------------------------------------------------------------------------

#[test]
fn sim_run_expected_command_advances() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "containers", "docker-compose-basics");

    run_instant(&dir, "docker --version")
        .success()
        .stdout(predicate::str::contains("Docker version"))
        .stdout(predicate::str::contains("moved to step 2"));
    assert_eq!(status_json(&dir)["steps"][1]["current"], true);
}

#[test]
fn sim_run_other_command_does_not_advance() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "containers", "docker-compose-basics");

    run_instant(&dir, "docker ps").success();
    assert_eq!(status_json(&dir)["steps"][0]["current"], true);
    assert_eq!(status_json(&dir)["steps"][0]["completed"], false);
}

#[test]
fn sim_run_json_returns_transcript() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "version-control", "git-first-commit");

    let out = guidepath(&dir)
        .args(["--json", "sim", "run", "--instant", "git", "init"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["lines"][0]["kind"], "input");
    assert_eq!(value["lines"][0]["text"], "git init");
    assert!(value["events"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["event"] == "step_completed"));
}

#[test]
fn completing_module_unlocks_quiz() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "version-control", "git-first-commit");

    for (i, command) in GIT_COMMANDS.iter().enumerate() {
        let assert = run_instant(&dir, command).success();
        if i + 1 == GIT_COMMANDS.len() {
            assert
                .stdout(predicate::str::contains("module 'git-first-commit' completed"))
                .stdout(predicate::str::contains("quiz unlocked"));
        }
    }
    assert_eq!(status_json(&dir)["state"], "completed");

    guidepath(&dir)
        .args(["quiz", "record", "--score", "80", "--passed"])
        .assert()
        .success();
    let progress = std::fs::read_to_string(
        dir.path()
            .join(".guidepath/progress/version-control/git-first-commit.yaml"),
    )
    .unwrap();
    assert!(progress.contains("score: 80"));
    assert!(progress.contains("current_step_index: 4"));
}

#[test]
fn quiz_record_refused_before_completion() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "version-control", "git-first-commit");
    run_instant(&dir, "git init").success();

    guidepath(&dir)
        .args(["quiz", "record", "--score", "80", "--passed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unlocks once every step is complete"));
    let progress = std::fs::read_to_string(
        dir.path()
            .join(".guidepath/progress/version-control/git-first-commit.yaml"),
    )
    .unwrap();
    assert!(!progress.contains("score:"));
}

#[test]
fn terminal_rejected_on_console_platform() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "cloud", "ec2-launch");
    run_instant(&dir, "aws ec2 run-instances")
        .failure()
        .stderr(predicate::str::contains("no free-text terminal"));
}

#[test]
fn console_highlights_current_step() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "cloud", "ec2-launch");

    let out = guidepath(&dir)
        .args(["--json", "sim", "console"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let affordances: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let highlighted: Vec<&str> = affordances
        .as_array()
        .unwrap()
        .iter()
        .filter(|a| a["highlighted"] == true)
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(highlighted, vec!["aws-open-ec2"]);

    guidepath(&dir)
        .args(["sim", "select", "aws-choose-ami", "--instant"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not highlighted"));
    guidepath(&dir)
        .args(["sim", "select", "aws-open-ec2", "--instant"])
        .assert()
        .success()
        .stdout(predicate::str::contains("moved to step 2"));
}

#[test]
fn sim_shell_reads_stdin_until_exit() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "containers", "docker-compose-basics");
    std::fs::write(
        dir.path().join(".guidepath/config.yaml"),
        std::fs::read_to_string(dir.path().join(".guidepath/config.yaml"))
            .unwrap()
            .replace("speed: 1.0", "speed: 0.01"),
    )
    .unwrap();

    guidepath(&dir)
        .args(["sim", "shell"])
        .write_stdin("docker --version\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("moved to step 2"));
}

// ---------------------------------------------------------------------------
// gate
// ---------------------------------------------------------------------------

#[test]
fn free_limit_gates_next_module() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    guidepath(&dir)
        .args(["config", "set-plan", "free", "--limit", "1"])
        .assert()
        .success();
    start(&dir, "version-control", "git-first-commit");

    for command in GIT_COMMANDS {
        run_instant(&dir, command).success();
    }

    guidepath(&dir)
        .args(["gate", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1/1"))
        .stdout(predicate::str::contains("upgrade required"));

    guidepath(&dir)
        .args(["module", "start", "containers", "docker-images"])
        .assert()
        .success()
        .stdout(predicate::str::contains("upgrade"));
    run_instant(&dir, "docker images")
        .failure()
        .stderr(predicate::str::contains("workflow limit reached"));
}

#[test]
fn pro_plan_is_never_gated() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    guidepath(&dir)
        .args(["config", "set-plan", "pro", "--limit", "0"])
        .assert()
        .success();
    guidepath(&dir)
        .args(["gate", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unlimited"))
        .stdout(predicate::str::contains("allowed"));
}

// ---------------------------------------------------------------------------
// config / mentor
// ---------------------------------------------------------------------------

#[test]
fn config_validate_default_is_clean() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    guidepath(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No warnings"));
}

#[test]
fn config_validate_rejects_zero_speed() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    let path = dir.path().join(".guidepath/config.yaml");
    let yaml = std::fs::read_to_string(&path)
        .unwrap()
        .replace("speed: 1.0", "speed: 0.0");
    std::fs::write(&path, yaml).unwrap();

    guidepath(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("simulator.speed"));
}

#[test]
fn mentor_unreachable_prints_apology() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "containers", "docker-compose-basics");
    point_mentor_at(&dir, "http://127.0.0.1:9/");

    guidepath(&dir)
        .args(["mentor", "ask", "what", "does", "-d", "do?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sorry"));
}

#[test]
fn mentor_follow_up_sends_prior_turns() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    start(&dir, "containers", "docker-compose-basics");

    let mut server = mockito::Server::new();
    point_mentor_at(&dir, &format!("{}/api/assistant", server.url()));

    let first = server
        .mock("POST", "/api/assistant")
        .match_body(mockito::Matcher::Regex(
            r#""messages":\[\{"role":"user","content":"what is compose"\}\]"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body("data: {\"choices\":[{\"delta\":{\"content\":\"It runs stacks.\"}}]}\ndata: [DONE]\n")
        .create();
    guidepath(&dir)
        .args(["mentor", "ask", "what", "is", "compose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("It runs stacks."));
    first.assert();

    let second = server
        .mock("POST", "/api/assistant")
        .match_body(mockito::Matcher::Regex(
            r#""messages":\[\{"role":"user","content":"what is compose"\},\{"role":"assistant","content":"It runs stacks\."\},\{"role":"user","content":"and down"\}\]"#
                .to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body("data: {\"choices\":[{\"delta\":{\"content\":\"It stops them.\"}}]}\ndata: [DONE]\n")
        .create();
    guidepath(&dir)
        .args(["mentor", "ask", "and", "down"])
        .assert()
        .success()
        .stdout(predicate::str::contains("It stops them."));
    second.assert();

    let history = std::fs::read_to_string(
        dir.path()
            .join(".guidepath/mentor/containers/docker-compose-basics.yaml"),
    )
    .unwrap();
    assert_eq!(history.matches("role:").count(), 4);
}
