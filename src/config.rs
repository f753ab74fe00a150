//! Build Configuration Module
//!
//! Settings for the web bundle step and the version stamp. Every field has a
//! default matching the firmware project's layout, so a missing config file
//! is the normal case.

use crate::web::TriggerPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file consulted when neither `--config` nor `HUB_BUILD_CONFIG` is set
pub const DEFAULT_CONFIG_FILE: &str = "hub-build.json";

/// Complete build helper configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    // === Web Bundle ===
    /// Web UI subdirectory, relative to the project root
    #[serde(default = "default_web_dir")]
    pub web_dir: PathBuf,
    /// Package manager executable
    #[serde(default = "default_package_manager")]
    pub package_manager: String,
    /// Arguments for the dependency install step
    #[serde(default = "default_install_args")]
    pub install_args: Vec<String>,
    /// Arguments for the build script step
    #[serde(default = "default_build_args")]
    pub build_args: Vec<String>,
    /// When the web bundle step runs
    #[serde(default)]
    pub trigger: TriggerPolicy,

    // === Version Stamp ===
    /// Preprocessor symbol receiving the version string
    #[serde(default = "default_version_define")]
    pub version_define: String,
    /// Version used when no revision can be resolved
    #[serde(default = "default_version_fallback")]
    pub version_fallback: String,
    /// Source-control executable
    #[serde(default = "default_git")]
    pub git: String,
}

fn default_web_dir() -> PathBuf {
    PathBuf::from("web2")
}
fn default_package_manager() -> String {
    if cfg!(windows) {
        "npm.cmd".to_string()
    } else {
        "npm".to_string()
    }
}
fn default_install_args() -> Vec<String> {
    vec!["install".to_string()]
}
fn default_build_args() -> Vec<String> {
    vec!["run".to_string(), "build".to_string()]
}
fn default_version_define() -> String {
    "MILIGHT_HUB_VERSION".to_string()
}
fn default_version_fallback() -> String {
    "UNKNOWN".to_string()
}
fn default_git() -> String {
    "git".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            web_dir: default_web_dir(),
            package_manager: default_package_manager(),
            install_args: default_install_args(),
            build_args: default_build_args(),
            trigger: TriggerPolicy::default(),
            version_define: default_version_define(),
            version_fallback: default_version_fallback(),
            git: default_git(),
        }
    }
}

impl BuildConfig {
    /// Load config from file, or fall back to defaults if missing or invalid
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config {}: {}, using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config file found at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content)?;
        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Web directory anchored at the project root
    pub fn web_dir_in(&self, project_root: &Path) -> PathBuf {
        if self.web_dir.is_absolute() {
            self.web_dir.clone()
        } else {
            project_root.join(&self.web_dir)
        }
    }
}

/// Directory that relative paths and git queries resolve against: the config
/// file's directory when it exists, otherwise `cwd`.
pub fn project_root(config_path: &Path, cwd: &Path) -> PathBuf {
    if !config_path.is_file() {
        return cwd.to_path_buf();
    }

    match config_path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => cwd.to_path_buf(),
        Some(parent) if parent.is_absolute() => parent.to_path_buf(),
        Some(parent) => cwd.join(parent),
        None => cwd.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default_values() {
        let config = BuildConfig::default();
        assert_eq!(config.web_dir, PathBuf::from("web2"));
        assert_eq!(config.install_args, vec!["install"]);
        assert_eq!(config.build_args, vec!["run", "build"]);
        assert_eq!(config.version_define, "MILIGHT_HUB_VERSION");
        assert_eq!(config.version_fallback, "UNKNOWN");
        assert_eq!(config.git, "git");
        assert!(config.package_manager.starts_with("npm"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = BuildConfig::load(temp_dir.path().join("absent.json"));
        assert_eq!(config, BuildConfig::default());
    }

    #[test]
    fn test_invalid_json_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hub-build.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(BuildConfig::load(&path), BuildConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hub-build.json");
        std::fs::write(
            &path,
            r#"{ "web_dir": "ui", "trigger": { "mode": "always" } }"#,
        )
        .unwrap();

        let config = BuildConfig::load(&path);
        assert_eq!(config.web_dir, PathBuf::from("ui"));
        assert_eq!(config.trigger, TriggerPolicy::Always);
        assert_eq!(config.version_define, "MILIGHT_HUB_VERSION");
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("hub-build.json");

        let mut config = BuildConfig::default();
        config.version_fallback = "dev".to_string();
        config.save(&path).unwrap();

        assert_eq!(BuildConfig::load(&path), config);
    }

    #[test]
    fn test_project_root_follows_existing_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hub-build.json");
        std::fs::write(&path, "{}").unwrap();

        let root = project_root(&path, Path::new("/somewhere/else"));
        assert_eq!(root, temp_dir.path());
    }

    #[test]
    fn test_project_root_without_config_is_cwd() {
        let root = project_root(Path::new("/nonexistent/hub-build.json"), Path::new("/work"));
        assert_eq!(root, PathBuf::from("/work"));
    }

    #[test]
    fn test_web_dir_resolution() {
        let config = BuildConfig::default();
        assert_eq!(
            config.web_dir_in(Path::new("/proj")),
            PathBuf::from("/proj/web2")
        );
    }
}
