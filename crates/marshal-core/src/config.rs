use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".marshal";
pub const CONFIG_FILE: &str = "config.toml";

/// Local coordination identity and policy for one agent checkout.
///
/// Absence of this file means the checkout is uncoordinated; that is a
/// warning, never an error.
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinationConfig {
    pub service_url: String,
    pub workspace_id: String,
    pub repo_id: String,
    pub alias: String,
    pub human_name: String,
    #[serde(default)]
    pub repo_origin: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_tracker_bin")]
    pub tracker_bin: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub auto_reserve: AutoReserveConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutoReserveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub include_untracked: bool,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for AutoReserveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_untracked: false,
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_role() -> String {
    "agent".to_string()
}

fn default_tracker_bin() -> String {
    "bd".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_ttl_secs() -> u64 {
    900
}

fn default_true() -> bool {
    true
}

impl CoordinationConfig {
    /// Load the config under `repo_root`, or from `explicit` when the
    /// invocation carried `--:local-config`. A missing file is
    /// `Ok(None)`; an unreadable or unparsable one is an error the
    /// caller downgrades to a warning.
    pub fn load(
        repo_root: &Path,
        explicit: Option<&Path>,
    ) -> Result<Option<CoordinationConfig>, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => default_path(repo_root),
        };
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    reason: err.to_string(),
                });
            }
        };
        let config = toml::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Ok(Some(config))
    }
}

pub fn default_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_DIR).join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CoordinationConfig::load(dir.path(), None).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let marshal_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&marshal_dir).unwrap();
        fs::write(
            marshal_dir.join(CONFIG_FILE),
            r#"
service_url = "http://localhost:4820"
workspace_id = "ws-1"
repo_id = "repo-1"
alias = "crow"
human_name = "Crow"
"#,
        )
        .unwrap();

        let config = CoordinationConfig::load(dir.path(), None).unwrap().unwrap();
        assert_eq!(config.tracker_bin, "bd");
        assert_eq!(config.role, "agent");
        assert!(config.auto_reserve.enabled);
        assert!(!config.auto_reserve.include_untracked);
        assert_eq!(config.auto_reserve.ttl_secs, 900);
    }

    #[test]
    fn test_corrupt_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let marshal_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&marshal_dir).unwrap();
        fs::write(marshal_dir.join(CONFIG_FILE), "not toml [").unwrap();

        let err = CoordinationConfig::load(dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
