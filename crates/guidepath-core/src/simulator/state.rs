use crate::types::{Platform, ServiceStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Compose services
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedService {
    pub name: String,
    pub image: String,
    pub status: ServiceStatus,
    pub ports: Vec<String>,
    pub volumes: Vec<String>,
    pub depends_on: Vec<String>,
}

impl SimulatedService {
    fn new(name: &str, image: &str, ports: &[&str], volumes: &[&str], depends_on: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            status: ServiceStatus::Stopped,
            ports: ports.iter().map(|s| s.to_string()).collect(),
            volumes: volumes.iter().map(|s| s.to_string()).collect(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Apply `target` if the lifecycle allows it. Returns whether it changed.
    pub fn transition(&mut self, target: ServiceStatus) -> bool {
        if self.status == target || !self.status.can_transition_to(target) {
            return false;
        }
        self.status = target;
        true
    }

    pub fn container_name(&self) -> String {
        format!("app-{}-1", self.name)
    }
}

// ---------------------------------------------------------------------------
// Docker engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub repository: String,
    pub tag: String,
    pub id: String,
    pub size: String,
}

impl Image {
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub name: String,
    pub image: String,
    pub ports: Vec<String>,
    pub status: ServiceStatus,
}

// ---------------------------------------------------------------------------
// Git repository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub branch: String,
    pub message: String,
    pub files: Vec<String>,
}

impl Commit {
    pub fn short(&self) -> &str {
        &self.hash[..7]
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RepoState {
    pub initialized: bool,
    pub branch: String,
    pub branches: Vec<String>,
    pub untracked: Vec<String>,
    pub staged: Vec<String>,
    pub commits: Vec<Commit>,
    pub remotes: BTreeMap<String, String>,
    /// Branches pushed to a remote, as `remote/branch`.
    pub upstream: Vec<String>,
}

impl RepoState {
    pub fn commits_on(&self, branch: &str) -> Vec<&Commit> {
        self.commits.iter().filter(|c| c.branch == branch).collect()
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    pub image: String,
    pub replicas: u32,
    pub status: ServiceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KubeService {
    pub name: String,
    pub cluster_ip: String,
    pub ports: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelmRelease {
    pub name: String,
    pub chart: String,
    pub revision: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterState {
    pub workloads: Vec<Workload>,
    pub services: Vec<KubeService>,
    pub releases: Vec<HelmRelease>,
}

impl ClusterState {
    pub fn workload(&self, name: &str) -> Option<&Workload> {
        self.workloads.iter().find(|w| w.name == name)
    }

    pub fn workload_mut(&mut self, name: &str) -> Option<&mut Workload> {
        self.workloads.iter_mut().find(|w| w.name == name)
    }

    pub fn release(&self, name: &str) -> Option<&HelmRelease> {
        self.releases.iter().find(|r| r.name == name)
    }
}

// ---------------------------------------------------------------------------
// Console resources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleResource {
    pub kind: String,
    pub id: String,
    pub status: ServiceStatus,
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// A state change applied by a background timer, decoupled from transcript
/// emission.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Every compose service moves to the given status where allowed.
    AllServices(ServiceStatus),
    Container { id: String, status: ServiceStatus },
    Workload { name: String, status: ServiceStatus },
    Console { id: String, status: ServiceStatus },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deferred {
    pub delay_ms: u64,
    pub mutation: Mutation,
}

impl Deferred {
    pub fn at(delay_ms: u64, mutation: Mutation) -> Self {
        Self { delay_ms, mutation }
    }
}

// ---------------------------------------------------------------------------
// SimState
// ---------------------------------------------------------------------------

/// In-memory model of the fake infrastructure behind one simulator panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimState {
    pub platform: Platform,
    pub services: Vec<SimulatedService>,
    pub images: Vec<Image>,
    pub containers: Vec<Container>,
    pub repo: RepoState,
    pub cluster: ClusterState,
    pub console: Vec<ConsoleResource>,
}

impl SimState {
    /// Fresh fixtures for a newly opened panel.
    pub fn for_platform(platform: Platform) -> Self {
        let mut state = Self {
            platform,
            services: Vec::new(),
            images: Vec::new(),
            containers: Vec::new(),
            repo: RepoState::default(),
            cluster: ClusterState::default(),
            console: Vec::new(),
        };
        match platform {
            Platform::Docker => {
                state.services = vec![
                    SimulatedService::new("web", "nginx:1.25", &["8080:80"], &[], &["api"]),
                    SimulatedService::new("api", "node:20-alpine", &["3000:3000"], &[], &["db"]),
                    SimulatedService::new(
                        "db",
                        "postgres:16",
                        &["5432:5432"],
                        &["db-data:/var/lib/postgresql/data"],
                        &[],
                    ),
                ];
                state.images = vec![
                    Image {
                        repository: "node".into(),
                        tag: "20-alpine".into(),
                        id: "1d2c4e6f8a0b".into(),
                        size: "132MB".into(),
                    },
                    Image {
                        repository: "nginx".into(),
                        tag: "1.25".into(),
                        id: "a8758716bb6a".into(),
                        size: "187MB".into(),
                    },
                ];
            }
            Platform::Git => {
                state.repo.untracked = vec![
                    ".gitignore".into(),
                    "Cargo.toml".into(),
                    "README.md".into(),
                    "src/main.rs".into(),
                ];
            }
            Platform::Kubernetes | Platform::Aws | Platform::Github => {}
        }
        state
    }

    pub fn service(&self, name: &str) -> Option<&SimulatedService> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn image(&self, reference: &str) -> Option<&Image> {
        let (repo, tag) = split_reference(reference);
        self.images
            .iter()
            .find(|i| i.repository == repo && i.tag == tag)
    }

    pub fn apply(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::AllServices(ServiceStatus::Running) => {
                // A service whose dependency is undeclared or failed cannot come up.
                let snapshot = self.services.clone();
                for svc in &mut self.services {
                    let broken = svc.depends_on.iter().any(|dep| {
                        snapshot
                            .iter()
                            .find(|s| &s.name == dep)
                            .map_or(true, |s| s.status == ServiceStatus::Error)
                    });
                    let target = if broken {
                        ServiceStatus::Error
                    } else {
                        ServiceStatus::Running
                    };
                    svc.transition(target);
                }
            }
            Mutation::AllServices(status) => {
                for svc in &mut self.services {
                    svc.transition(*status);
                }
            }
            Mutation::Container { id, status } => {
                if let Some(c) = self.containers.iter_mut().find(|c| &c.id == id) {
                    if c.status.can_transition_to(*status) {
                        c.status = *status;
                    }
                }
            }
            Mutation::Workload { name, status } => {
                if let Some(w) = self.cluster.workload_mut(name) {
                    if w.status.can_transition_to(*status) {
                        w.status = *status;
                    }
                }
            }
            Mutation::Console { id, status } => {
                if let Some(r) = self.console.iter_mut().find(|r| &r.id == id) {
                    if r.status.can_transition_to(*status) {
                        r.status = *status;
                    }
                }
            }
        }
    }
}

/// `repo:tag`, defaulting the tag to `latest`.
pub fn split_reference(reference: &str) -> (&str, &str) {
    match reference.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, tag),
        _ => (reference, "latest"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(state: &SimState) -> Vec<ServiceStatus> {
        state.services.iter().map(|s| s.status).collect()
    }

    #[test]
    fn docker_fixture_starts_stopped() {
        let state = SimState::for_platform(Platform::Docker);
        assert_eq!(state.services.len(), 3);
        assert!(statuses(&state).iter().all(|s| *s == ServiceStatus::Stopped));
    }

    #[test]
    fn running_requires_starting_first() {
        let mut state = SimState::for_platform(Platform::Docker);
        state.apply(&Mutation::AllServices(ServiceStatus::Running));
        assert!(statuses(&state).iter().all(|s| *s == ServiceStatus::Stopped));

        state.apply(&Mutation::AllServices(ServiceStatus::Starting));
        state.apply(&Mutation::AllServices(ServiceStatus::Running));
        assert!(statuses(&state).iter().all(|s| *s == ServiceStatus::Running));

        state.apply(&Mutation::AllServices(ServiceStatus::Stopped));
        assert!(statuses(&state).iter().all(|s| *s == ServiceStatus::Stopped));
    }

    #[test]
    fn undeclared_dependency_errors() {
        let mut state = SimState::for_platform(Platform::Docker);
        state.services[0].depends_on = vec!["cache".into()];
        state.apply(&Mutation::AllServices(ServiceStatus::Starting));
        state.apply(&Mutation::AllServices(ServiceStatus::Running));
        assert_eq!(state.service("web").unwrap().status, ServiceStatus::Error);
        assert_eq!(state.service("db").unwrap().status, ServiceStatus::Running);
    }

    #[test]
    fn split_reference_defaults_latest() {
        assert_eq!(split_reference("webapp:1.0"), ("webapp", "1.0"));
        assert_eq!(split_reference("webapp"), ("webapp", "latest"));
        assert_eq!(
            split_reference("localhost:5000/webapp"),
            ("localhost:5000/webapp", "latest")
        );
    }
}
