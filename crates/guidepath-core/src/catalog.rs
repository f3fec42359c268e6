use crate::error::{GuideError, Result};
use crate::paths;
use crate::simulator::Simulator;
use crate::types::Platform;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// Step / Module / Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Opaque token matched against simulator and UI events.
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl Step {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            action: action.into(),
            tip: None,
            warning: None,
        }
    }

    pub fn tip(mut self, tip: impl Into<String>) -> Self {
        self.tip = Some(tip.into());
        self
    }

    pub fn warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub name: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

impl Module {
    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    pub fn has_step(&self, step_id: &str) -> bool {
        self.step_index(step_id).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub modules: Vec<String>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Read-only tree of categories, modules and ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<Category>,
    pub modules: Vec<Module>,
}

impl Catalog {
    /// Load `.guidepath/catalog.yaml` when present, otherwise the built-in catalog.
    pub fn load(root: &Path) -> Result<Self> {
        let catalog = match crate::io::read_yaml::<Catalog>(&paths::catalog_path(root))? {
            Some(c) => c,
            None => Self::builtin(),
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, id: &str) -> Result<&Category> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| GuideError::CategoryNotFound(id.to_string()))
    }

    pub fn module(&self, id: &str) -> Result<&Module> {
        self.modules
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| GuideError::ModuleNotFound(id.to_string()))
    }

    /// Look up a module and check it is listed under `category`.
    pub fn module_in(&self, category: &str, module: &str) -> Result<&Module> {
        let cat = self.category(category)?;
        if !cat.modules.iter().any(|m| m == module) {
            return Err(GuideError::ModuleNotInCategory {
                category: category.to_string(),
                module: module.to_string(),
            });
        }
        self.module(module)
    }

    pub fn modules_for(&self, category: &str) -> Result<Vec<&Module>> {
        let cat = self.category(category)?;
        cat.modules.iter().map(|id| self.module(id)).collect()
    }

    /// First category listing `module`, used when only a module id is known.
    pub fn category_of(&self, module: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.modules.iter().any(|m| m == module))
    }

    pub fn validate(&self) -> Result<()> {
        let mut module_ids = HashSet::new();
        for module in &self.modules {
            paths::validate_slug(&module.id)
                .map_err(|_| invalid(format!("module id '{}' is not a slug", module.id)))?;
            if !module_ids.insert(module.id.as_str()) {
                return Err(invalid(format!("duplicate module id '{}'", module.id)));
            }
            if module.steps.is_empty() {
                return Err(invalid(format!("module '{}' has no steps", module.id)));
            }
            let mut step_ids = HashSet::new();
            for step in &module.steps {
                paths::validate_slug(&step.id).map_err(|_| {
                    invalid(format!(
                        "step id '{}' in module '{}' is not a slug",
                        step.id, module.id
                    ))
                })?;
                if !step_ids.insert(step.id.as_str()) {
                    return Err(invalid(format!(
                        "duplicate step id '{}' in module '{}'",
                        step.id, module.id
                    )));
                }
                if step.action.trim().is_empty() {
                    return Err(invalid(format!(
                        "step '{}' in module '{}' has an empty action",
                        step.id, module.id
                    )));
                }
                // A terminal step is only reachable through a known command.
                if !module.platform.is_console()
                    && Simulator::expected_command(module.platform, &step.action).is_none()
                {
                    return Err(invalid(format!(
                        "step '{}' in module '{}' has action '{}' with no {} command",
                        step.id, module.id, step.action, module.platform
                    )));
                }
            }
        }

        let mut category_ids = HashSet::new();
        for cat in &self.categories {
            paths::validate_slug(&cat.id)
                .map_err(|_| invalid(format!("category id '{}' is not a slug", cat.id)))?;
            if !category_ids.insert(cat.id.as_str()) {
                return Err(invalid(format!("duplicate category id '{}'", cat.id)));
            }
            for m in &cat.modules {
                if !module_ids.contains(m.as_str()) {
                    return Err(invalid(format!(
                        "category '{}' references unknown module '{}'",
                        cat.id, m
                    )));
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Built-in workflows
    // -----------------------------------------------------------------------

    pub fn builtin() -> Self {
        Self {
            categories: vec![
                category(
                    "containers",
                    "Containers",
                    &["docker-compose-basics", "docker-images"],
                ),
                category(
                    "version-control",
                    "Version Control",
                    &["git-first-commit", "github-pull-request"],
                ),
                category(
                    "orchestration",
                    "Orchestration",
                    &["kubectl-deploy", "helm-release"],
                ),
                category("cloud", "Cloud Consoles", &["ec2-launch"]),
            ],
            modules: vec![
                docker_compose_basics(),
                docker_images(),
                git_first_commit(),
                github_pull_request(),
                kubectl_deploy(),
                helm_release(),
                ec2_launch(),
            ],
        }
    }
}

fn invalid(msg: String) -> GuideError {
    GuideError::InvalidCatalog(msg)
}

fn category(id: &str, name: &str, modules: &[&str]) -> Category {
    Category {
        id: id.to_string(),
        name: name.to_string(),
        modules: modules.iter().map(|m| m.to_string()).collect(),
    }
}

fn module(id: &str, name: &str, platform: Platform, description: &str, steps: Vec<Step>) -> Module {
    Module {
        id: id.to_string(),
        name: name.to_string(),
        platform,
        description: Some(description.to_string()),
        steps,
    }
}

fn docker_compose_basics() -> Module {
    module(
        "docker-compose-basics",
        "Run a multi-service app with Docker Compose",
        Platform::Docker,
        "Bring up a web, api and database stack, inspect it, and tear it down.",
        vec![
            Step::new(
                "check-docker",
                "Verify Docker is installed",
                "Print the Docker client version to confirm the toolchain is available.",
                "docker-version",
            ),
            Step::new(
                "start-stack",
                "Start the stack in the background",
                "Create and start every service declared in docker-compose.yml.",
                "compose-up",
            )
            .tip("-d runs the containers detached so the terminal stays usable."),
            Step::new(
                "list-services",
                "Check service status",
                "List the compose services and confirm each one is running.",
                "compose-ps",
            ),
            Step::new(
                "read-logs",
                "Read the logs",
                "Print the aggregated log output of every service.",
                "compose-logs",
            ),
            Step::new(
                "stop-stack",
                "Tear the stack down",
                "Stop and remove the containers and the default network.",
                "compose-down",
            )
            .warning("Adding -v also deletes named volumes, including the database data."),
        ],
    )
}

fn docker_images() -> Module {
    module(
        "docker-images",
        "Build and run your own image",
        Platform::Docker,
        "Build an image from a Dockerfile, then run it as a container.",
        vec![
            Step::new(
                "build-image",
                "Build the image",
                "Build the Dockerfile in the current directory and tag it webapp:1.0.",
                "docker-build",
            )
            .tip("The trailing dot is the build context sent to the daemon."),
            Step::new(
                "list-images",
                "List local images",
                "Confirm the new tag shows up in the local image store.",
                "docker-images",
            ),
            Step::new(
                "run-container",
                "Run a container",
                "Start the image detached and publish port 80 on host port 8080.",
                "docker-run",
            )
            .warning("Publishing on 0.0.0.0 exposes the port to your whole network."),
            Step::new(
                "list-containers",
                "List running containers",
                "Check the container is up and the port mapping is correct.",
                "docker-ps",
            ),
        ],
    )
}

fn git_first_commit() -> Module {
    module(
        "git-first-commit",
        "Make your first commit and push it",
        Platform::Git,
        "Initialize a repository, commit the project and publish it to a remote.",
        vec![
            Step::new(
                "init-repo",
                "Initialize the repository",
                "Create an empty Git repository in the project directory.",
                "git-init",
            ),
            Step::new(
                "stage-files",
                "Stage the project files",
                "Add every file in the working tree to the index.",
                "git-add",
            )
            .tip("Run git status first to see what will be staged."),
            Step::new(
                "commit",
                "Create the first commit",
                "Record the staged snapshot with a short message.",
                "git-commit",
            ),
            Step::new(
                "add-remote",
                "Add the remote",
                "Register the hosted repository under the name origin.",
                "git-remote",
            ),
            Step::new(
                "push",
                "Push to the remote",
                "Upload main and set it to track origin/main.",
                "git-push",
            )
            .warning("Never force-push a branch other people have pulled."),
        ],
    )
}

fn github_pull_request() -> Module {
    module(
        "github-pull-request",
        "Open and merge a pull request",
        Platform::Github,
        "Walk through the GitHub web flow from repository to merged pull request.",
        vec![
            Step::new(
                "create-repo",
                "Create a repository",
                "Use the New button to create a public repository.",
                "github-new-repo",
            ),
            Step::new(
                "create-branch",
                "Create a branch",
                "Open the branch selector and create feature/readme.",
                "github-create-branch",
            ),
            Step::new(
                "open-pr",
                "Open a pull request",
                "Compare feature/readme against main and open a pull request.",
                "github-open-pr",
            )
            .tip("Describe what changed and why in the pull request body."),
            Step::new(
                "merge-pr",
                "Merge the pull request",
                "Merge once the checks pass.",
                "github-merge-pr",
            ),
        ],
    )
}

fn kubectl_deploy() -> Module {
    module(
        "kubectl-deploy",
        "Deploy a workload with kubectl",
        Platform::Kubernetes,
        "Apply a deployment manifest, inspect its pods, scale it and find its service.",
        vec![
            Step::new(
                "check-cluster",
                "Check the cluster connection",
                "Print client and server versions to confirm kubectl can reach the cluster.",
                "kubectl-version",
            ),
            Step::new(
                "apply-manifest",
                "Apply the deployment",
                "Create the web deployment from deployment.yaml.",
                "kubectl-apply",
            ),
            Step::new(
                "get-pods",
                "Inspect the pods",
                "List the pods created by the deployment.",
                "kubectl-get-pods",
            )
            .tip("Pods start as ContainerCreating; run it again after a moment."),
            Step::new(
                "scale",
                "Scale the deployment",
                "Raise the replica count of web to three.",
                "kubectl-scale",
            ),
            Step::new(
                "get-services",
                "Find the service",
                "List services to find the cluster IP of web.",
                "kubectl-get-svc",
            ),
        ],
    )
}

fn helm_release() -> Module {
    module(
        "helm-release",
        "Manage a Helm release",
        Platform::Kubernetes,
        "Install a chart, list releases, upgrade with new values and uninstall.",
        vec![
            Step::new(
                "install",
                "Install the chart",
                "Install ./chart as the release named web.",
                "helm-install",
            ),
            Step::new(
                "list-releases",
                "List releases",
                "Show the deployed releases and their revisions.",
                "helm-list",
            ),
            Step::new(
                "upgrade",
                "Upgrade the release",
                "Upgrade web with two replicas.",
                "helm-upgrade",
            )
            .tip("--set overrides a single value from values.yaml."),
            Step::new(
                "uninstall",
                "Uninstall the release",
                "Remove the release and every resource it created.",
                "helm-uninstall",
            )
            .warning("Uninstalling deletes the release history as well."),
        ],
    )
}

fn ec2_launch() -> Module {
    module(
        "ec2-launch",
        "Launch an EC2 instance",
        Platform::Aws,
        "Use the AWS console to launch a small Linux instance.",
        vec![
            Step::new(
                "open-ec2",
                "Open the EC2 dashboard",
                "Navigate from the console home to the EC2 service.",
                "aws-open-ec2",
            ),
            Step::new(
                "choose-ami",
                "Choose an AMI",
                "Pick the Amazon Linux 2023 image.",
                "aws-choose-ami",
            ),
            Step::new(
                "choose-type",
                "Choose an instance type",
                "Select t2.micro, which is free-tier eligible.",
                "aws-choose-instance-type",
            )
            .tip("Larger types are billed per second while running."),
            Step::new(
                "security-group",
                "Configure the security group",
                "Allow inbound SSH from your IP only.",
                "aws-configure-sg",
            )
            .warning("Opening port 22 to 0.0.0.0/0 invites brute-force attempts."),
            Step::new(
                "launch",
                "Launch the instance",
                "Review the settings and launch.",
                "aws-launch-instance",
            ),
        ],
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
