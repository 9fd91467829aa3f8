//! Configuration handling for archstage
//!
//! Configuration is stored in `.archstage/config.toml` (project) and
//! `~/.config/archstage/config.toml` (global).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Settings for the staging engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StagingConfig {
    /// Seconds a cached projection stays valid
    pub projection_ttl_secs: u64,

    /// Default for `commit --strict`: block on drift that overlaps staged elements
    pub strict_drift: bool,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            projection_ttl_secs: 5,
            strict_drift: false,
        }
    }
}

impl StagingConfig {
    /// Returns the projection cache TTL
    pub fn projection_ttl(&self) -> Duration {
        Duration::from_secs(self.projection_ttl_secs)
    }
}

/// Built-in validation rules to run against projections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Report references to elements that do not exist
    pub reference_integrity: bool,

    /// Check that element fields agree with their ids
    pub element_identity: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            reference_integrity: true,
            element_identity: true,
        }
    }
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Staging engine settings
    pub staging: StagingConfig,

    /// Validation settings
    pub validation: ValidationConfig,
}

impl ProjectConfig {
    /// Checks values that parse but make no sense
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.staging.projection_ttl_secs > 24 * 60 * 60 {
            return Err(ConfigError::Invalid(format!(
                "staging.projection_ttl_secs must be at most one day, got {}",
                self.staging.projection_ttl_secs
            )));
        }
        Ok(())
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Global and project configuration for one invocation
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads the global config, plus the project config when run inside a project
    pub fn load() -> Result<Self> {
        match Self::find_project_root() {
            Some(root) => Self::for_project(&root),
            None => Ok(Self {
                global: Self::load_global()?,
                ..Self::default()
            }),
        }
    }

    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let path = Self::project_config_path(project_root);
        let project: ProjectConfig = read_toml(&path, "project")?;
        project.validate()?;

        Ok(Self {
            project,
            global: Self::load_global()?,
            project_root: Some(project_root.to_path_buf()),
        })
    }

    /// Returns the path of a project's config file
    pub fn project_config_path(project_root: &Path) -> PathBuf {
        project_root.join(".archstage").join("config.toml")
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "archstage", "archstage")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    fn load_global() -> Result<GlobalConfig> {
        match Self::global_config_dir() {
            Some(dir) => read_toml(&dir.join("config.toml"), "global"),
            None => Ok(GlobalConfig::default()),
        }
    }

    /// Finds the project root from the current directory
    pub fn find_project_root() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        Self::find_project_root_from(&cwd)
    }

    /// Walks up from `start` to the first directory holding `.archstage/`
    pub fn find_project_root_from(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(".archstage").is_dir())
            .map(Path::to_path_buf)
    }
}

/// Reads a TOML file; a missing file yields the defaults
fn read_toml<T: DeserializeOwned + Default>(path: &Path, which: &str) -> Result<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read {} config: {}", which, path.display()))
        }
    };

    toml::from_str(&content)
        .map_err(|e| ConfigError::Parse(e.to_string()))
        .with_context(|| format!("Failed to parse {} config: {}", which, path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();

        assert_eq!(config.project.staging.projection_ttl_secs, 5);
        assert!(!config.project.staging.strict_drift);
        assert!(config.project.validation.reference_integrity);
        assert_eq!(config.global.default_format, OutputFormat::Text);
        assert!(config.project_root.is_none());
    }

    #[test]
    fn parse_project_config() {
        let toml = r#"
[staging]
projection_ttl_secs = 30
strict_drift = true

[validation]
reference_integrity = false
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.staging.projection_ttl(), Duration::from_secs(30));
        assert!(config.staging.strict_drift);
        assert!(!config.validation.reference_integrity);
        assert!(config.validation.element_identity);
    }

    #[test]
    fn parse_global_config() {
        let config: GlobalConfig = toml::from_str("default_format = \"json\"\n").unwrap();
        assert_eq!(config.default_format, OutputFormat::Json);
    }

    #[test]
    fn reject_absurd_ttl() {
        let mut config = ProjectConfig::default();
        config.staging.projection_ttl_secs = 10 * 24 * 60 * 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn for_project_reads_config_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".archstage")).unwrap();
        fs::write(
            Config::project_config_path(dir.path()),
            "[staging]\nstrict_drift = true\n",
        )
        .unwrap();

        let config = Config::for_project(dir.path()).unwrap();
        assert!(config.project.staging.strict_drift);
        assert_eq!(config.project.staging.projection_ttl_secs, 5);
        assert_eq!(config.project_root.as_deref(), Some(dir.path()));
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let dir = TempDir::new().unwrap();

        let config = Config::for_project(dir.path()).unwrap();
        assert_eq!(config.project, ProjectConfig::default());
    }

    #[test]
    fn malformed_project_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".archstage")).unwrap();
        fs::write(Config::project_config_path(dir.path()), "[staging\n").unwrap();

        let err = Config::for_project(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse project config"));
    }

    #[test]
    fn project_root_found_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".archstage")).unwrap();
        let nested = dir.path().join("docs").join("architecture");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(Config::find_project_root_from(&nested).as_deref(), Some(dir.path()));
    }
}
