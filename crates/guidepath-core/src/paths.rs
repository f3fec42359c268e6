use crate::error::{GuideError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const GUIDEPATH_DIR: &str = ".guidepath";
pub const PROGRESS_DIR: &str = ".guidepath/progress";
pub const MENTOR_DIR: &str = ".guidepath/mentor";

pub const CONFIG_FILE: &str = ".guidepath/config.yaml";
pub const STATE_FILE: &str = ".guidepath/state.yaml";
pub const CATALOG_FILE: &str = ".guidepath/catalog.yaml";
pub const LEDGER_FILE: &str = ".guidepath/completions.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn guidepath_dir(root: &Path) -> PathBuf {
    root.join(GUIDEPATH_DIR)
}

pub fn progress_dir(root: &Path) -> PathBuf {
    root.join(PROGRESS_DIR)
}

pub fn progress_path(root: &Path, category: &str, module: &str) -> PathBuf {
    progress_dir(root)
        .join(category)
        .join(format!("{module}.yaml"))
}

/// Mentor chat history for one module.
pub fn mentor_history_path(root: &Path, category: &str, module: &str) -> PathBuf {
    root.join(MENTOR_DIR)
        .join(category)
        .join(format!("{module}.yaml"))
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn catalog_path(root: &Path) -> PathBuf {
    root.join(CATALOG_FILE)
}

pub fn ledger_path(root: &Path) -> PathBuf {
    root.join(LEDGER_FILE)
}

// ---------------------------------------------------------------------------
// Slug validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(GuideError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_slugs() {
        for slug in ["docker-compose-basics", "a", "ec2-launch", "k8s"] {
            validate_slug(slug).unwrap_or_else(|_| panic!("expected valid: {slug}"));
        }
    }

    #[test]
    fn invalid_slugs() {
        for slug in ["", "-dash", "dash-", "has spaces", "UPPER", "a_b", "../up"] {
            assert!(validate_slug(slug).is_err(), "expected invalid: {slug}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/lab");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/lab/.guidepath/config.yaml")
        );
        assert_eq!(
            progress_path(root, "containers", "docker-compose-basics"),
            PathBuf::from("/tmp/lab/.guidepath/progress/containers/docker-compose-basics.yaml")
        );
        assert_eq!(
            mentor_history_path(root, "cloud", "ec2-launch"),
            PathBuf::from("/tmp/lab/.guidepath/mentor/cloud/ec2-launch.yaml")
        );
    }
}
