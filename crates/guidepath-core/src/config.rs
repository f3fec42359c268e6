use crate::error::{GuideError, Result};
use crate::gate::PlanTier;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// Stable id the completion ledger is keyed by.
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default)]
    pub tier: PlanTier,
    #[serde(default = "default_free_workflow_limit")]
    pub free_workflow_limit: usize,
}

fn default_free_workflow_limit() -> usize {
    3
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            tier: PlanTier::Free,
            free_workflow_limit: default_free_workflow_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorConfig {
    #[serde(default = "default_mentor_endpoint")]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Environment variable holding the bearer token, if the endpoint needs one.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_mentor_endpoint() -> String {
    "http://localhost:3000/api/assistant".to_string()
}

fn default_api_key_env() -> String {
    "GUIDEPATH_MENTOR_KEY".to_string()
}

impl Default for MentorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_mentor_endpoint(),
            model: None,
            api_key_env: default_api_key_env(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Multiplier on scripted output delays. `0.5` plays twice as fast.
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_speed() -> f64 {
    1.0
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub learner: LearnerConfig,
    #[serde(default)]
    pub plan: PlanConfig,
    #[serde(default)]
    pub mentor: MentorConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(learner_id: impl Into<String>) -> Self {
        Self {
            version: 1,
            learner: LearnerConfig {
                id: learner_id.into(),
            },
            plan: PlanConfig::default(),
            mentor: MentorConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }

    /// A config with a freshly generated learner id.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(GuideError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.learner.id.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "learner.id is empty; completions cannot be attributed".to_string(),
            });
        }

        if !(self.simulator.speed.is_finite() && self.simulator.speed > 0.0) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "simulator.speed must be a positive number, got {}",
                    self.simulator.speed
                ),
            });
        } else if self.simulator.speed > 10.0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "simulator.speed={} makes output very slow (>10 is unusual)",
                    self.simulator.speed
                ),
            });
        }

        if self.plan.tier == PlanTier::Free && self.plan.free_workflow_limit == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "plan.free_workflow_limit is 0; every module is gated on the free plan"
                    .to_string(),
            });
        }

        if self.mentor.endpoint.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "mentor.endpoint is empty; 'guidepath mentor ask' will fail".to_string(),
            });
        } else if !self.mentor.endpoint.starts_with("http://")
            && !self.mentor.endpoint.starts_with("https://")
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "mentor.endpoint '{}' is not an http(s) URL",
                    self.mentor.endpoint
                ),
            });
        }

        warnings
    }

    /// Effective delay for a scripted line.
    pub fn scaled_delay_ms(&self, delay_ms: u64) -> u64 {
        let speed = if self.simulator.speed.is_finite() && self.simulator.speed > 0.0 {
            self.simulator.speed
        } else {
            default_speed()
        };
        (delay_ms as f64 * speed).round() as u64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
