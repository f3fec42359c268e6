use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Aws,
    Docker,
    Git,
    Github,
    Kubernetes,
}

impl Platform {
    pub fn all() -> &'static [Platform] {
        &[
            Platform::Aws,
            Platform::Docker,
            Platform::Git,
            Platform::Github,
            Platform::Kubernetes,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Aws => "aws",
            Platform::Docker => "docker",
            Platform::Git => "git",
            Platform::Github => "github",
            Platform::Kubernetes => "kubernetes",
        }
    }

    /// Console platforms are driven by affordances instead of free text.
    pub fn is_console(self) -> bool {
        matches!(self, Platform::Aws | Platform::Github)
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Platform::Aws => "aws-console",
            Platform::Github => "github.com",
            Platform::Docker => "learner@lab:~/app$",
            Platform::Git => "learner@lab:~/repo$",
            Platform::Kubernetes => "learner@lab:~/k8s$",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = crate::error::GuideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws" => Ok(Platform::Aws),
            "docker" => Ok(Platform::Docker),
            "git" => Ok(Platform::Git),
            "github" => Ok(Platform::Github),
            "kubernetes" | "kubectl" | "helm" | "k8s" => Ok(Platform::Kubernetes),
            _ => Err(crate::error::GuideError::UnknownPlatform(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// LineKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Input,
    Output,
    Error,
    Success,
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LineKind::Input => "input",
            LineKind::Output => "output",
            LineKind::Error => "error",
            LineKind::Success => "success",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ServiceStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Stopped,
    Starting,
    Running,
    Error,
}

impl ServiceStatus {
    /// `stopped -> starting -> running | error`, and anything may be stopped.
    pub fn can_transition_to(self, target: ServiceStatus) -> bool {
        matches!(
            (self, target),
            (ServiceStatus::Stopped, ServiceStatus::Starting)
                | (ServiceStatus::Starting, ServiceStatus::Running)
                | (ServiceStatus::Starting, ServiceStatus::Error)
                | (_, ServiceStatus::Stopped)
        )
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Starting => "starting",
            ServiceStatus::Running => "running",
            ServiceStatus::Error => "error",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
