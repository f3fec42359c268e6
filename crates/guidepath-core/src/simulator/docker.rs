use super::rules::{columns, command_rule, fake_hex, flag_value, positionals, RuleTable};
use super::state::{split_reference, Container, Deferred, Image, Mutation, SimState};
use super::TerminalLine;
use crate::types::ServiceStatus;

/// Step action → the one literal command that completes it.
pub const EXPECTED: &[(&str, &str)] = &[
    ("docker-version", "docker --version"),
    ("compose-up", "docker-compose up -d"),
    ("compose-ps", "docker-compose ps"),
    ("compose-logs", "docker-compose logs"),
    ("compose-down", "docker-compose down"),
    ("docker-build", "docker build -t webapp:1.0 ."),
    ("docker-images", "docker images"),
    ("docker-run", "docker run -d -p 8080:80 webapp:1.0"),
    ("docker-ps", "docker ps"),
];

/// Offsets of the background status flips scheduled by `compose up`/`down`.
pub const STARTING_AT_MS: u64 = 200;
pub const RUNNING_AT_MS: u64 = 1500;
pub const STOPPED_AT_MS: u64 = 500;

pub fn rules() -> RuleTable {
    RuleTable::new(vec![
        command_rule! {
            id: "compose_up",
            pattern: "compose up",
            output: compose_up,
            effect: |_, _| vec![
                Deferred::at(STARTING_AT_MS, Mutation::AllServices(ServiceStatus::Starting)),
                Deferred::at(RUNNING_AT_MS, Mutation::AllServices(ServiceStatus::Running)),
            ]
        },
        command_rule! {
            id: "compose_down",
            pattern: "compose down",
            output: compose_down,
            effect: |_, _| vec![
                Deferred::at(STOPPED_AT_MS, Mutation::AllServices(ServiceStatus::Stopped)),
            ]
        },
        command_rule! {
            id: "compose_ps",
            pattern: "compose ps",
            output: compose_ps
        },
        command_rule! {
            id: "compose_logs",
            pattern: "compose logs",
            output: compose_logs
        },
        command_rule! {
            id: "compose_usage",
            pattern: "compose",
            output: |_, _| vec![
                TerminalLine::output("Usage:  docker compose [OPTIONS] COMMAND", 50),
                TerminalLine::output("", 0),
                TerminalLine::output("Commands:", 0),
                TerminalLine::output("  up      Create and start containers", 0),
                TerminalLine::output("  down    Stop and remove containers, networks", 0),
                TerminalLine::output("  ps      List containers", 0),
                TerminalLine::output("  logs    View output from containers", 0),
            ]
        },
        command_rule! {
            id: "docker_build",
            pattern: "docker build",
            output: docker_build,
            effect: |state, input| {
                let tag = build_tag(input);
                let (repo, tag) = split_reference(&tag);
                state.images.retain(|i| !(i.repository == repo && i.tag == tag));
                state.images.push(Image {
                    repository: repo.to_string(),
                    tag: tag.to_string(),
                    id: fake_hex(&format!("image:{repo}:{tag}"), 12),
                    size: "148MB".into(),
                });
                Vec::new()
            }
        },
        command_rule! {
            id: "docker_run",
            pattern: "docker run",
            output: docker_run,
            effect: |state, input| {
                let Some(image) = run_image(input) else {
                    return Vec::new();
                };
                if state.image(&image).is_none() {
                    let (repo, tag) = split_reference(&image);
                    state.images.push(Image {
                        repository: repo.to_string(),
                        tag: tag.to_string(),
                        id: fake_hex(&format!("image:{repo}:{tag}"), 12),
                        size: "64MB".into(),
                    });
                }
                let id = container_id(state.containers.len(), &image);
                state.containers.push(Container {
                    id: id.clone(),
                    name: container_name(state.containers.len()),
                    image,
                    ports: publish_flags(input),
                    status: ServiceStatus::Starting,
                });
                vec![Deferred::at(800, Mutation::Container { id, status: ServiceStatus::Running })]
            }
        },
        command_rule! {
            id: "docker_ps",
            pattern: "docker ps",
            output: docker_ps
        },
        command_rule! {
            id: "docker_images",
            pattern: "docker images",
            output: docker_images
        },
        command_rule! {
            id: "docker_version",
            pattern: "docker --version",
            output: |_, _| vec![TerminalLine::output("Docker version 24.0.7, build afdd53b", 150)]
        },
        command_rule! {
            id: "help",
            pattern: "help",
            output: |_, _| super::help_lines(EXPECTED)
        },
    ])
}

// ---------------------------------------------------------------------------
// Compose
// ---------------------------------------------------------------------------

fn compose_up(state: &SimState, _: &str) -> Vec<TerminalLine> {
    let n = state.services.len();
    let mut lines = vec![
        TerminalLine::output(format!("[+] Running {n}/{n}"), 200),
        TerminalLine::output(" ✔ Network app_default  Created", 300),
    ];
    for svc in &state.services {
        let verb = if svc.status == ServiceStatus::Stopped {
            "Started"
        } else {
            "Running"
        };
        lines.push(TerminalLine::output(
            format!(" ✔ Container {}  {verb}", svc.container_name()),
            350,
        ));
    }
    lines.push(TerminalLine::success(
        "Stack is up. Services will be ready shortly.",
        150,
    ));
    lines
}

fn compose_down(state: &SimState, _: &str) -> Vec<TerminalLine> {
    let n = state.services.len();
    let mut lines = vec![TerminalLine::output(format!("[+] Running {}/{}", n + 1, n + 1), 150)];
    for svc in state.services.iter().rev() {
        lines.push(TerminalLine::output(
            format!(" ✔ Container {}  Removed", svc.container_name()),
            300,
        ));
    }
    lines.push(TerminalLine::output(" ✔ Network app_default  Removed", 200));
    lines
}

fn compose_ps(state: &SimState, _: &str) -> Vec<TerminalLine> {
    let rows: Vec<Vec<String>> = state
        .services
        .iter()
        .filter(|s| s.status != ServiceStatus::Stopped)
        .map(|s| {
            let status = match s.status {
                ServiceStatus::Running => "Up 4 seconds".to_string(),
                ServiceStatus::Starting => "Up 1 second (health: starting)".to_string(),
                ServiceStatus::Error => "Exited (1) 2 seconds ago".to_string(),
                ServiceStatus::Stopped => String::new(),
            };
            vec![
                s.container_name(),
                s.image.clone(),
                s.name.clone(),
                status,
                s.ports
                    .iter()
                    .map(|p| format!("0.0.0.0:{}/tcp", p.replace(':', "->")))
                    .collect::<Vec<_>>()
                    .join(", "),
            ]
        })
        .collect();
    columns(&["NAME", "IMAGE", "SERVICE", "STATUS", "PORTS"], &rows)
        .into_iter()
        .enumerate()
        .map(|(i, l)| TerminalLine::output(l, if i == 0 { 200 } else { 60 }))
        .collect()
}

fn compose_logs(state: &SimState, _: &str) -> Vec<TerminalLine> {
    let running: Vec<_> = state
        .services
        .iter()
        .filter(|s| s.status == ServiceStatus::Running)
        .collect();
    if running.is_empty() {
        return vec![TerminalLine::output("no running services to show logs for", 150)];
    }
    let mut lines = Vec::new();
    for svc in running {
        let message = match svc.name.as_str() {
            "db" => "database system is ready to accept connections",
            "api" => "server listening on :3000",
            "web" => "start worker processes",
            _ => "started",
        };
        lines.push(TerminalLine::output(
            format!("{:<6}| {message}", format!("{}-1", svc.name)),
            120,
        ));
    }
    lines
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

fn build_tag(input: &str) -> String {
    flag_value(input, "-t")
        .or_else(|| flag_value(input, "--tag"))
        .unwrap_or_else(|| "app:latest".to_string())
}

fn docker_build(_: &SimState, input: &str) -> Vec<TerminalLine> {
    let tag = build_tag(input);
    let (repo, version) = split_reference(&tag);
    vec![
        TerminalLine::output("[+] Building 6.4s (9/9) FINISHED", 300),
        TerminalLine::output(" => [internal] load build definition from Dockerfile", 200),
        TerminalLine::output(" => [1/4] FROM docker.io/library/node:20-alpine", 400),
        TerminalLine::output(" => [2/4] WORKDIR /app", 150),
        TerminalLine::output(" => [3/4] RUN npm ci --omit=dev", 900),
        TerminalLine::output(" => [4/4] COPY . .", 200),
        TerminalLine::output(" => exporting to image", 300),
        TerminalLine::output(
            format!(" => => naming to docker.io/library/{repo}:{version}"),
            100,
        ),
        TerminalLine::success(format!("Successfully tagged {repo}:{version}"), 100),
    ]
}

fn run_image(input: &str) -> Option<String> {
    positionals(input, 2, &["-p", "--publish", "--name", "-e", "--env", "-v"])
        .into_iter()
        .next()
}

fn publish_flags(input: &str) -> Vec<String> {
    flag_value(input, "-p")
        .or_else(|| flag_value(input, "--publish"))
        .into_iter()
        .collect()
}

fn container_id(seq: usize, image: &str) -> String {
    fake_hex(&format!("container:{seq}:{image}"), 64)
}

fn container_name(seq: usize) -> String {
    const NAMES: &[&str] = &["eager_turing", "quirky_hopper", "brave_lovelace", "calm_ritchie"];
    NAMES[seq % NAMES.len()].to_string()
}

fn docker_run(state: &SimState, input: &str) -> Vec<TerminalLine> {
    let Some(image) = run_image(input) else {
        return vec![TerminalLine::error(
            "\"docker run\" requires at least 1 argument.",
            100,
        )];
    };
    let mut lines = Vec::new();
    if state.image(&image).is_none() {
        let (repo, tag) = split_reference(&image);
        lines.push(TerminalLine::output(
            format!("Unable to find image '{repo}:{tag}' locally"),
            300,
        ));
        lines.push(TerminalLine::output(
            format!("{tag}: Pulling from library/{repo}"),
            600,
        ));
        lines.push(TerminalLine::output(
            format!("Status: Downloaded newer image for {repo}:{tag}"),
            900,
        ));
    }
    lines.push(TerminalLine::output(
        container_id(state.containers.len(), &image),
        400,
    ));
    lines
}

fn docker_ps(state: &SimState, _: &str) -> Vec<TerminalLine> {
    let mut rows: Vec<Vec<String>> = state
        .containers
        .iter()
        .filter(|c| c.status == ServiceStatus::Running)
        .map(|c| {
            vec![
                c.id[..12].to_string(),
                c.image.clone(),
                "\"docker-entrypoint\"".to_string(),
                "Up 3 seconds".to_string(),
                c.ports
                    .iter()
                    .map(|p| format!("0.0.0.0:{}/tcp", p.replace(':', "->")))
                    .collect::<Vec<_>>()
                    .join(", "),
                c.name.clone(),
            ]
        })
        .collect();
    rows.extend(
        state
            .services
            .iter()
            .filter(|s| s.status == ServiceStatus::Running)
            .map(|s| {
                vec![
                    fake_hex(&format!("service:{}", s.name), 12),
                    s.image.clone(),
                    "\"docker-entrypoint\"".to_string(),
                    "Up 5 seconds".to_string(),
                    s.ports
                        .iter()
                        .map(|p| format!("0.0.0.0:{}/tcp", p.replace(':', "->")))
                        .collect::<Vec<_>>()
                        .join(", "),
                    s.container_name(),
                ]
            }),
    );
    columns(
        &["CONTAINER ID", "IMAGE", "COMMAND", "STATUS", "PORTS", "NAMES"],
        &rows,
    )
    .into_iter()
    .enumerate()
    .map(|(i, l)| TerminalLine::output(l, if i == 0 { 200 } else { 60 }))
    .collect()
}

fn docker_images(state: &SimState, _: &str) -> Vec<TerminalLine> {
    let rows: Vec<Vec<String>> = state
        .images
        .iter()
        .rev()
        .map(|i| {
            vec![
                i.repository.clone(),
                i.tag.clone(),
                i.id.clone(),
                i.size.clone(),
            ]
        })
        .collect();
    columns(&["REPOSITORY", "TAG", "IMAGE ID", "SIZE"], &rows)
        .into_iter()
        .enumerate()
        .map(|(i, l)| TerminalLine::output(l, if i == 0 { 200 } else { 60 }))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LineKind, Platform};

    fn run(state: &mut SimState, input: &str) -> (Option<&'static str>, Vec<TerminalLine>) {
        let d = rules().dispatch(state, input);
        for deferred in &d.deferred {
            state.apply(&deferred.mutation);
        }
        (d.rule_id, d.lines)
    }

    #[test]
    fn every_expected_command_has_a_rule() {
        let table = rules();
        for (action, command) in EXPECTED {
            let rule = table.find(command).unwrap_or_else(|| panic!("{action}"));
            assert_ne!(rule.id, "help", "{action} fell through to help");
        }
    }

    #[test]
    fn compose_subcommands_are_not_shadowed() {
        let table = rules();
        assert_eq!(table.find("docker-compose up -d").unwrap().id, "compose_up");
        assert_eq!(table.find("docker compose down").unwrap().id, "compose_down");
        assert_eq!(table.find("docker-compose ps").unwrap().id, "compose_ps");
        assert_eq!(table.find("docker compose logs -f").unwrap().id, "compose_logs");
        assert_eq!(table.find("docker-compose config").unwrap().id, "compose_usage");
        assert_eq!(table.find("docker ps -a").unwrap().id, "docker_ps");
    }

    #[test]
    fn compose_up_schedules_background_flips() {
        let mut state = SimState::for_platform(Platform::Docker);
        let d = rules().dispatch(&mut state, "docker-compose up -d");
        assert_eq!(
            d.deferred,
            vec![
                Deferred::at(200, Mutation::AllServices(ServiceStatus::Starting)),
                Deferred::at(1500, Mutation::AllServices(ServiceStatus::Running)),
            ]
        );
        // Nothing changes until the timers fire.
        assert!(state
            .services
            .iter()
            .all(|s| s.status == ServiceStatus::Stopped));
    }

    #[test]
    fn ps_lists_only_live_services() {
        let mut state = SimState::for_platform(Platform::Docker);
        let (_, lines) = run(&mut state, "docker-compose ps");
        assert_eq!(lines.len(), 1);
        run(&mut state, "docker-compose up -d");
        let (_, lines) = run(&mut state, "docker-compose ps");
        assert_eq!(lines.len(), 4);
        assert!(lines[1].text.contains("Up"));
    }

    #[test]
    fn build_adds_tagged_image() {
        let mut state = SimState::for_platform(Platform::Docker);
        run(&mut state, "docker build -t webapp:1.0 .");
        assert!(state.image("webapp:1.0").is_some());
        let (_, lines) = run(&mut state, "docker images");
        assert!(lines.iter().any(|l| l.text.starts_with("webapp")));
    }

    #[test]
    fn run_pulls_missing_image_and_starts_container() {
        let mut state = SimState::for_platform(Platform::Docker);
        let (_, lines) = run(&mut state, "docker run -d -p 8080:80 redis:7");
        assert!(lines[0].text.contains("Unable to find image 'redis:7'"));
        assert_eq!(state.containers.len(), 1);
        assert_eq!(state.containers[0].status, ServiceStatus::Running);
        assert_eq!(state.containers[0].ports, vec!["8080:80".to_string()]);
        let (_, ps) = run(&mut state, "docker ps");
        assert!(ps.iter().any(|l| l.text.contains("redis:7")));
    }

    #[test]
    fn run_without_image_is_an_error_line() {
        let mut state = SimState::for_platform(Platform::Docker);
        let (_, lines) = run(&mut state, "docker run -d");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].kind, LineKind::Error);
        assert!(state.containers.is_empty());
    }
}
