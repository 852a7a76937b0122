use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::MIN_ITERATIONS;
use crate::errors::{PwVaultError, Result};
use crate::vault::history::DEFAULT_MAXIMUM_COUNT;
use crate::vault::Document;

/// Project-level configuration, loaded from `.pwvault.toml`.
///
/// Every field has a sensible default so pwvault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Vault file (relative to the project root) used when `--file` is not given.
    #[serde(default = "default_vault_file")]
    pub vault_file: String,

    /// Key-stretch iteration count for newly saved vaults (at least 2048).
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Refresh an entry's LastAccessTime when its secrets are read.
    #[serde(default = "default_true")]
    pub track_access: bool,

    /// Refresh creation/modification times and the save stamps on change.
    #[serde(default = "default_true")]
    pub track_modify: bool,

    /// History size used by `history --enable` when no size is given.
    #[serde(default = "default_history_max")]
    pub history_max: usize,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_file() -> String {
    "vault.psafe3".to_string()
}

fn default_iterations() -> u32 {
    MIN_ITERATIONS
}

fn default_true() -> bool {
    true
}

fn default_history_max() -> usize {
    DEFAULT_MAXIMUM_COUNT
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_file: default_vault_file(),
            iterations: default_iterations(),
            track_access: default_true(),
            track_modify: default_true(),
            history_max: default_history_max(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    const FILE_NAME: &'static str = ".pwvault.toml";

    /// Load settings from `<project_dir>/.pwvault.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            PwVaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        tracing::debug!(path = %config_path.display(), "loaded settings");
        Ok(settings)
    }

    /// Full path to the configured vault file.
    ///
    /// Example: `project_dir/vault.psafe3`
    pub fn vault_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.vault_file)
    }

    /// Push the iteration count and tracking flags onto a document.
    pub fn apply(&self, document: &mut Document) {
        document.set_iterations(self.iterations);
        document.set_track_access(self.track_access);
        document.set_track_modify(self.track_modify);
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.vault_file, "vault.psafe3");
        assert_eq!(s.iterations, 2048);
        assert!(s.track_access);
        assert!(s.track_modify);
        assert_eq!(s.history_max, 3);
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.vault_file, "vault.psafe3");
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
vault_file = "secrets/team.psafe3"
iterations = 100000
track_access = false
track_modify = false
history_max = 10
"#;
        fs::write(tmp.path().join(".pwvault.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.vault_file, "secrets/team.psafe3");
        assert_eq!(settings.iterations, 100_000);
        assert!(!settings.track_access);
        assert!(!settings.track_modify);
        assert_eq!(settings.history_max, 10);
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".pwvault.toml"), "track_access = false\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert!(!settings.track_access);
        // Rest should be defaults
        assert_eq!(settings.vault_file, "vault.psafe3");
        assert_eq!(settings.iterations, 2048);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".pwvault.toml"), "not valid {{toml").unwrap();

        let result = Settings::load(tmp.path());
        assert!(matches!(result, Err(PwVaultError::ConfigError(_))));
    }

    #[test]
    fn vault_path_joins_project_dir() {
        let s = Settings {
            vault_file: "keys/main.psafe3".to_string(),
            ..Settings::default()
        };
        let project = Path::new("/home/user/myproject");
        assert_eq!(
            s.vault_path(project),
            PathBuf::from("/home/user/myproject/keys/main.psafe3")
        );
    }

    #[test]
    fn apply_floors_low_iteration_counts() {
        let s = Settings {
            iterations: 10,
            track_access: false,
            ..Settings::default()
        };
        let mut doc = Document::new("pw").unwrap();
        s.apply(&mut doc);
        assert_eq!(doc.iterations(), 2048);
        assert!(!doc.tracks_access());
        assert!(doc.tracks_modify());
    }
}
