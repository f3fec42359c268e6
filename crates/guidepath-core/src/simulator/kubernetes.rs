use super::rules::{columns, command_rule, fake_hex, flag_value, positionals, RuleTable};
use super::state::{Deferred, HelmRelease, KubeService, Mutation, SimState, Workload};
use super::TerminalLine;
use crate::types::ServiceStatus;

pub const EXPECTED: &[(&str, &str)] = &[
    ("kubectl-version", "kubectl version"),
    ("kubectl-apply", "kubectl apply -f deployment.yaml"),
    ("kubectl-get-pods", "kubectl get pods"),
    ("kubectl-scale", "kubectl scale deployment web --replicas=3"),
    ("kubectl-get-svc", "kubectl get services"),
    ("helm-install", "helm install web ./chart"),
    ("helm-list", "helm list"),
    ("helm-upgrade", "helm upgrade web ./chart --set replicas=2"),
    ("helm-uninstall", "helm uninstall web"),
];

pub const STARTING_AT_MS: u64 = 200;
pub const RUNNING_AT_MS: u64 = 1500;

/// Manifest applied by `kubectl apply -f <file>`; the workload is named
/// after the file stem when it is not `deployment`.
const DEFAULT_WORKLOAD: &str = "web";
const DEFAULT_IMAGE: &str = "nginx:1.25";

pub fn rules() -> RuleTable {
    RuleTable::new(vec![
        command_rule! {
            id: "apply",
            pattern: "kubectl apply",
            output: |state, input| {
                let Some(file) = flag_value(input, "-f") else {
                    return vec![TerminalLine::error(
                        "error: must specify one of -f and -k",
                        100,
                    )];
                };
                let name = workload_for_manifest(&file);
                let verb = if state.cluster.workload(&name).is_some() { "configured" } else { "created" };
                vec![
                    TerminalLine::output(format!("deployment.apps/{name} {verb}"), 400),
                    TerminalLine::output(format!("service/{name} {verb}"), 150),
                ]
            },
            effect: |state, input| {
                let Some(file) = flag_value(input, "-f") else {
                    return Vec::new();
                };
                let name = workload_for_manifest(&file);
                deploy(state, &name, DEFAULT_IMAGE, 1)
            }
        },
        command_rule! {
            id: "get_pods",
            pattern: "get pods",
            output: get_pods
        },
        command_rule! {
            id: "get_deployments",
            pattern: "get deployments",
            output: get_deployments
        },
        command_rule! {
            id: "get_services",
            pattern: "get services",
            output: get_services
        },
        command_rule! {
            id: "get_svc",
            pattern: "get svc",
            output: get_services
        },
        command_rule! {
            id: "get",
            pattern: "kubectl get",
            output: |_, input| {
                let kind = positionals(input, 2, &["-n", "--namespace", "-o"])
                    .into_iter()
                    .next()
                    .unwrap_or_default();
                if kind.is_empty() {
                    vec![TerminalLine::error(
                        "You must specify the type of resource to get.",
                        80,
                    )]
                } else {
                    vec![TerminalLine::error(
                        format!("error: the server doesn't have a resource type \"{kind}\""),
                        120,
                    )]
                }
            }
        },
        command_rule! {
            id: "scale",
            pattern: "kubectl scale",
            output: |state, input| match scale_target(input) {
                Some((name, _)) if state.cluster.workload(&name).is_some() => {
                    vec![TerminalLine::output(format!("deployment.apps/{name} scaled"), 250)]
                }
                Some((name, _)) => vec![TerminalLine::error(
                    format!("Error from server (NotFound): deployments.apps \"{name}\" not found"),
                    200,
                )],
                None => vec![TerminalLine::error(
                    "error: required flag(s) \"replicas\" not set",
                    80,
                )],
            },
            effect: |state, input| {
                if let Some((name, replicas)) = scale_target(input) {
                    if let Some(w) = state.cluster.workload_mut(&name) {
                        w.replicas = replicas;
                    }
                }
                Vec::new()
            }
        },
        command_rule! {
            id: "logs",
            pattern: "kubectl logs",
            output: |state, input| {
                let target = positionals(input, 2, &["-n", "--namespace", "--tail"])
                    .into_iter()
                    .next()
                    .unwrap_or_default();
                let name = target.trim_start_matches("deployment/").split('-').next().unwrap_or_default().to_string();
                match state.cluster.workload(&name) {
                    Some(w) if w.status == ServiceStatus::Running => vec![
                        TerminalLine::output("/docker-entrypoint.sh: Configuration complete; ready for start up", 150),
                        TerminalLine::output("2024/01/01 00:00:00 [notice] 1#1: start worker processes", 80),
                    ],
                    Some(_) => vec![TerminalLine::error(
                        format!("Error from server (BadRequest): container \"{name}\" is waiting to start: ContainerCreating"),
                        150,
                    )],
                    None => vec![TerminalLine::error(
                        format!("Error from server (NotFound): pods \"{target}\" not found"),
                        150,
                    )],
                }
            }
        },
        command_rule! {
            id: "delete",
            pattern: "kubectl delete",
            output: |state, input| {
                let name = delete_target(input);
                if state.cluster.workload(&name).is_some() {
                    vec![TerminalLine::output(format!("deployment.apps \"{name}\" deleted"), 300)]
                } else {
                    vec![TerminalLine::error(
                        format!("Error from server (NotFound): deployments.apps \"{name}\" not found"),
                        200,
                    )]
                }
            },
            effect: |state, input| {
                let name = delete_target(input);
                undeploy(state, &name);
                Vec::new()
            }
        },
        command_rule! {
            id: "version",
            pattern: "kubectl version",
            output: |_, _| vec![
                TerminalLine::output("Client Version: v1.29.1", 120),
                TerminalLine::output("Kustomize Version: v5.0.4-0.20230601165947-6ce0bf390ce3", 20),
                TerminalLine::output("Server Version: v1.29.0", 250),
            ]
        },
        command_rule! {
            id: "helm_install",
            pattern: "helm install",
            output: |state, input| match release_args(input) {
                Some((name, _)) if state.cluster.release(&name).is_some() => vec![TerminalLine::error(
                    "Error: INSTALLATION FAILED: cannot re-use a name that is still in use",
                    300,
                )],
                Some((name, _)) => release_notes(&name, 1, "deployed"),
                None => vec![TerminalLine::error(
                    "Error: INSTALLATION FAILED: must either provide a name or specify --generate-name",
                    200,
                )],
            },
            effect: |state, input| {
                let Some((name, chart)) = release_args(input) else {
                    return Vec::new();
                };
                if state.cluster.release(&name).is_some() {
                    return Vec::new();
                }
                state.cluster.releases.push(HelmRelease { name: name.clone(), chart, revision: 1 });
                deploy(state, &name, DEFAULT_IMAGE, replicas_from_set(input).unwrap_or(1))
            }
        },
        command_rule! {
            id: "helm_upgrade",
            pattern: "helm upgrade",
            output: |state, input| match release_args(input) {
                Some((name, _)) => match state.cluster.release(&name) {
                    Some(r) => release_notes(&name, r.revision + 1, "deployed"),
                    None => vec![TerminalLine::error(
                        format!("Error: UPGRADE FAILED: \"{name}\" has no deployed releases"),
                        300,
                    )],
                },
                None => vec![TerminalLine::error(
                    "Error: \"helm upgrade\" requires 2 arguments",
                    100,
                )],
            },
            effect: |state, input| {
                let Some((name, chart)) = release_args(input) else {
                    return Vec::new();
                };
                let Some(release) = state.cluster.releases.iter_mut().find(|r| r.name == name) else {
                    return Vec::new();
                };
                release.revision += 1;
                release.chart = chart;
                if let Some(n) = replicas_from_set(input) {
                    if let Some(w) = state.cluster.workload_mut(&name) {
                        w.replicas = n;
                    }
                }
                Vec::new()
            }
        },
        command_rule! {
            id: "helm_list",
            pattern: "helm list",
            output: |state, _| {
                let rows: Vec<Vec<String>> = state
                    .cluster
                    .releases
                    .iter()
                    .map(|r| {
                        vec![
                            r.name.clone(),
                            "default".into(),
                            r.revision.to_string(),
                            "deployed".into(),
                            chart_name(&r.chart),
                        ]
                    })
                    .collect();
                table_lines(&["NAME", "NAMESPACE", "REVISION", "STATUS", "CHART"], &rows)
            }
        },
        command_rule! {
            id: "helm_uninstall",
            pattern: "helm uninstall",
            output: |state, input| {
                let name = positionals(input, 2, &[]).into_iter().next().unwrap_or_default();
                if state.cluster.release(&name).is_some() {
                    vec![TerminalLine::output(format!("release \"{name}\" uninstalled"), 400)]
                } else {
                    vec![TerminalLine::error(
                        format!("Error: uninstall: Release not loaded: {name}: release: not found"),
                        200,
                    )]
                }
            },
            effect: |state, input| {
                let name = positionals(input, 2, &[]).into_iter().next().unwrap_or_default();
                if state.cluster.release(&name).is_some() {
                    state.cluster.releases.retain(|r| r.name != name);
                    undeploy(state, &name);
                }
                Vec::new()
            }
        },
        command_rule! {
            id: "help",
            pattern: "help",
            output: |_, _| super::help_lines(EXPECTED)
        },
    ])
}

// ---------------------------------------------------------------------------
// Cluster effects
// ---------------------------------------------------------------------------

/// Create or refresh a workload and its service. New workloads start in the
/// background.
fn deploy(state: &mut SimState, name: &str, image: &str, replicas: u32) -> Vec<Deferred> {
    if state.cluster.workload(name).is_some() {
        return Vec::new();
    }
    state.cluster.workloads.push(Workload {
        name: name.to_string(),
        image: image.to_string(),
        replicas,
        status: ServiceStatus::Stopped,
    });
    let octet = 10 + state.cluster.services.len();
    state.cluster.services.push(KubeService {
        name: name.to_string(),
        cluster_ip: format!("10.96.0.{octet}"),
        ports: "80/TCP".into(),
    });
    vec![
        Deferred::at(
            STARTING_AT_MS,
            Mutation::Workload {
                name: name.to_string(),
                status: ServiceStatus::Starting,
            },
        ),
        Deferred::at(
            RUNNING_AT_MS,
            Mutation::Workload {
                name: name.to_string(),
                status: ServiceStatus::Running,
            },
        ),
    ]
}

fn undeploy(state: &mut SimState, name: &str) {
    state.cluster.workloads.retain(|w| w.name != name);
    state.cluster.services.retain(|s| s.name != name);
}

fn workload_for_manifest(file: &str) -> String {
    let stem = file
        .rsplit('/')
        .next()
        .unwrap_or(file)
        .trim_end_matches(".yaml")
        .trim_end_matches(".yml");
    if stem.is_empty() || stem == "deployment" {
        DEFAULT_WORKLOAD.to_string()
    } else {
        stem.to_string()
    }
}

fn scale_target(input: &str) -> Option<(String, u32)> {
    let replicas = flag_value(input, "--replicas")?.parse().ok()?;
    let target = positionals(input, 2, &["-n", "--namespace"])
        .into_iter()
        .find(|a| a != "deployment")?;
    let name = target
        .strip_prefix("deployment/")
        .unwrap_or(&target)
        .to_string();
    Some((name, replicas))
}

fn delete_target(input: &str) -> String {
    let args = positionals(input, 2, &["-n", "--namespace", "-f"]);
    let target = args
        .iter()
        .find(|a| *a != "deployment")
        .cloned()
        .or_else(|| flag_value(input, "-f").map(|f| workload_for_manifest(&f)))
        .unwrap_or_default();
    target
        .strip_prefix("deployment/")
        .unwrap_or(&target)
        .to_string()
}

fn release_args(input: &str) -> Option<(String, String)> {
    let args = positionals(input, 2, &["--set", "-f", "--values", "-n", "--namespace"]);
    match args.as_slice() {
        [name, chart, ..] => Some((name.clone(), chart.clone())),
        _ => None,
    }
}

fn replicas_from_set(input: &str) -> Option<u32> {
    flag_value(input, "--set")?
        .split(',')
        .find_map(|kv| kv.strip_prefix("replicas="))
        .and_then(|n| n.parse().ok())
}

fn chart_name(chart: &str) -> String {
    let base = chart.trim_start_matches("./").trim_end_matches('/');
    format!("{}-0.1.0", base.rsplit('/').next().unwrap_or(base))
}

fn release_notes(name: &str, revision: u32, status: &str) -> Vec<TerminalLine> {
    vec![
        TerminalLine::output(format!("NAME: {name}"), 600),
        TerminalLine::output("LAST DEPLOYED: Mon Jan  1 00:00:00 2024", 20),
        TerminalLine::output("NAMESPACE: default", 20),
        TerminalLine::output(format!("STATUS: {status}"), 20),
        TerminalLine::output(format!("REVISION: {revision}"), 20),
        TerminalLine::success("TEST SUITE: None", 20),
    ]
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

fn table_lines(headers: &[&str], rows: &[Vec<String>]) -> Vec<TerminalLine> {
    columns(headers, rows)
        .into_iter()
        .enumerate()
        .map(|(i, l)| TerminalLine::output(l, if i == 0 { 250 } else { 40 }))
        .collect()
}

fn pod_status(status: ServiceStatus) -> (&'static str, &'static str) {
    match status {
        ServiceStatus::Stopped => ("Pending", "0"),
        ServiceStatus::Starting => ("ContainerCreating", "0"),
        ServiceStatus::Running => ("Running", "1"),
        ServiceStatus::Error => ("CrashLoopBackOff", "0"),
    }
}

fn get_pods(state: &SimState, _: &str) -> Vec<TerminalLine> {
    if state.cluster.workloads.is_empty() {
        return vec![TerminalLine::output("No resources found in default namespace.", 200)];
    }
    let rows: Vec<Vec<String>> = state
        .cluster
        .workloads
        .iter()
        .flat_map(|w| {
            let (status, ready) = pod_status(w.status);
            (0..w.replicas).map(move |i| {
                vec![
                    format!(
                        "{}-{}-{}",
                        w.name,
                        fake_hex(&format!("rs:{}", w.name), 10),
                        &fake_hex(&format!("pod:{}:{i}", w.name), 5)
                    ),
                    format!("{ready}/1"),
                    status.to_string(),
                    "0".to_string(),
                    "5s".to_string(),
                ]
            })
        })
        .collect();
    table_lines(&["NAME", "READY", "STATUS", "RESTARTS", "AGE"], &rows)
}

fn get_deployments(state: &SimState, _: &str) -> Vec<TerminalLine> {
    if state.cluster.workloads.is_empty() {
        return vec![TerminalLine::output("No resources found in default namespace.", 200)];
    }
    let rows: Vec<Vec<String>> = state
        .cluster
        .workloads
        .iter()
        .map(|w| {
            let ready = if w.status == ServiceStatus::Running {
                w.replicas
            } else {
                0
            };
            vec![
                w.name.clone(),
                format!("{ready}/{}", w.replicas),
                ready.to_string(),
                ready.to_string(),
                "5s".to_string(),
            ]
        })
        .collect();
    table_lines(&["NAME", "READY", "UP-TO-DATE", "AVAILABLE", "AGE"], &rows)
}

fn get_services(state: &SimState, _: &str) -> Vec<TerminalLine> {
    let mut rows = vec![vec![
        "kubernetes".to_string(),
        "ClusterIP".to_string(),
        "10.96.0.1".to_string(),
        "<none>".to_string(),
        "443/TCP".to_string(),
    ]];
    rows.extend(state.cluster.services.iter().map(|s| {
        vec![
            s.name.clone(),
            "ClusterIP".to_string(),
            s.cluster_ip.clone(),
            "<none>".to_string(),
            s.ports.clone(),
        ]
    }));
    table_lines(&["NAME", "TYPE", "CLUSTER-IP", "EXTERNAL-IP", "PORT(S)"], &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;

    fn run(state: &mut SimState, input: &str) -> Vec<TerminalLine> {
        let d = rules().dispatch(state, input);
        for deferred in &d.deferred {
            state.apply(&deferred.mutation);
        }
        d.lines
    }

    #[test]
    fn every_expected_command_has_a_rule() {
        let table = rules();
        for (action, command) in EXPECTED {
            let rule = table.find(command).unwrap_or_else(|| panic!("{action}"));
            assert_ne!(rule.id, "help");
            assert_ne!(rule.id, "get", "{action} fell through to generic get");
        }
    }

    #[test]
    fn apply_schedules_workload_rollout() {
        let mut state = SimState::for_platform(Platform::Kubernetes);
        let d = rules().dispatch(&mut state, "kubectl apply -f deployment.yaml");
        assert_eq!(d.deferred.len(), 2);
        assert_eq!(d.deferred[0].delay_ms, 200);
        assert_eq!(d.deferred[1].delay_ms, 1500);
        assert_eq!(
            state.cluster.workload("web").map(|w| w.status),
            Some(ServiceStatus::Stopped)
        );
        for deferred in &d.deferred {
            state.apply(&deferred.mutation);
        }
        assert_eq!(
            state.cluster.workload("web").map(|w| w.status),
            Some(ServiceStatus::Running)
        );
    }

    #[test]
    fn scale_changes_pod_count() {
        let mut state = SimState::for_platform(Platform::Kubernetes);
        run(&mut state, "kubectl apply -f deployment.yaml");
        run(&mut state, "kubectl scale deployment web --replicas=3");
        let pods = run(&mut state, "kubectl get pods");
        assert_eq!(pods.len(), 4);
        assert!(pods[1].text.contains("Running"));
    }

    #[test]
    fn get_without_workloads() {
        let mut state = SimState::for_platform(Platform::Kubernetes);
        let lines = run(&mut state, "kubectl get pods");
        assert_eq!(lines[0].text, "No resources found in default namespace.");
        let svc = run(&mut state, "kubectl get svc");
        assert_eq!(svc.len(), 2);
        assert!(svc[1].text.starts_with("kubernetes"));
    }

    #[test]
    fn helm_lifecycle() {
        let mut state = SimState::for_platform(Platform::Kubernetes);
        run(&mut state, "helm install web ./chart");
        assert_eq!(state.cluster.release("web").map(|r| r.revision), Some(1));
        assert_eq!(
            state.cluster.workload("web").map(|w| w.status),
            Some(ServiceStatus::Running)
        );

        let dup = run(&mut state, "helm install web ./chart");
        assert!(dup[0].text.contains("cannot re-use a name"));

        run(&mut state, "helm upgrade web ./chart --set replicas=2");
        assert_eq!(state.cluster.release("web").map(|r| r.revision), Some(2));
        assert_eq!(state.cluster.workload("web").map(|w| w.replicas), Some(2));

        let list = run(&mut state, "helm list");
        assert!(list[1].text.contains("chart-0.1.0"));

        run(&mut state, "helm uninstall web");
        assert!(state.cluster.releases.is_empty());
        assert!(state.cluster.workloads.is_empty());
    }

    #[test]
    fn unknown_resource_type() {
        let mut state = SimState::for_platform(Platform::Kubernetes);
        let lines = run(&mut state, "kubectl get widgets");
        assert!(lines[0].text.contains("\"widgets\""));
    }
}
