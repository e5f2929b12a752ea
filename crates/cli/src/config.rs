//! Application configuration for the `omnicmd` binary.

use std::{
    env, fs,
    fs::{create_dir_all, write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use omnicmd_util::expand_tilde;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Command manifest files (JSON or YAML) loaded at startup.
    pub manifests: Vec<String>,
    pub http: HttpConfig,
    pub mcp: McpConfig,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    pub bind_address: Option<String>,
    /// Prefix under which command routes are mounted, e.g. `/api`.
    pub base_path: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct McpConfig {
    pub bind_address: Option<String>,
}

impl AppConfig {
    pub fn manifest_paths(&self) -> Vec<PathBuf> {
        self.manifests.iter().map(|path| expand_tilde(path)).collect()
    }
}

/// Returns the default path for the configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var("OMNICMD_CONFIG_PATH")
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("omnicmd")
        .join("config.json")
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from_path(&default_config_path())
}

/// Loads configuration from `path`; a missing file yields the defaults.
pub fn load_config_from_path(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let content = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse config {}", path.display()))
}

pub fn save_config_to_path(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent_directory) = path.parent() {
        create_dir_all(parent_directory)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_honors_environment_override() {
        let override_path = "~/custom/omnicmd/config.json";
        temp_env::with_var("OMNICMD_CONFIG_PATH", Some(override_path), || {
            assert_eq!(default_config_path(), expand_tilde(override_path));
        });
    }

    #[test]
    fn blank_override_falls_back_to_config_dir() {
        temp_env::with_var("OMNICMD_CONFIG_PATH", Some("  "), || {
            assert!(default_config_path().ends_with("omnicmd/config.json"));
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = load_config_from_path(&dir.path().join("absent.json")).expect("load");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            manifests: vec!["~/commands.yaml".into()],
            http: HttpConfig {
                bind_address: Some("127.0.0.1:8080".into()),
                base_path: "/api".into(),
            },
            mcp: McpConfig::default(),
        };
        save_config_to_path(&config, &path).expect("save");
        assert_eq!(load_config_from_path(&path).expect("load"), config);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"http": {"basePath": "/v1"}}"#).expect("write");
        let config = load_config_from_path(&path).expect("load");
        assert_eq!(config.http.base_path, "/v1");
        assert!(config.http.bind_address.is_none());
        assert!(config.manifests.is_empty());
    }

    #[test]
    fn malformed_files_are_errors() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").expect("write");
        assert!(load_config_from_path(&path).is_err());
    }
}
