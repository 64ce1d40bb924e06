use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ShipitError};

/// Name of the project-level configuration file
pub const CONFIG_FILE_NAME: &str = "shipit.toml";

/// Represents the complete configuration for shipit.
///
/// Contains the changelog location, script paths, process execution limits and
/// the version-control executable.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_changelog")]
    pub changelog: String,

    #[serde(default)]
    pub scripts: ScriptsConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub vcs: VcsConfig,
}

fn default_changelog() -> String {
    "CHANGELOG.md".to_string()
}

fn default_build_script() -> String {
    if cfg!(windows) {
        "scripts/build.cmd".to_string()
    } else {
        "scripts/build.sh".to_string()
    }
}

fn default_release_script() -> String {
    if cfg!(windows) {
        "scripts/release.cmd".to_string()
    } else {
        "scripts/release.sh".to_string()
    }
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_drain_interval_ms() -> u64 {
    1000
}

fn default_kill_on_timeout() -> bool {
    true
}

fn default_vcs_program() -> String {
    "git".to_string()
}

/// Paths of the build and release scripts, relative to the project directory
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScriptsConfig {
    #[serde(default = "default_build_script")]
    pub build: String,

    #[serde(default = "default_release_script")]
    pub release: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        ScriptsConfig {
            build: default_build_script(),
            release: default_release_script(),
        }
    }
}

/// Limits applied to every supervised process
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExecutionConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,

    /// Kill the process when it exceeds the timeout instead of leaving it running.
    ///
    /// On unix the whole process group is killed, including anything the
    /// script started in the background. Elsewhere only the direct child is.
    #[serde(default = "default_kill_on_timeout")]
    pub kill_on_timeout: bool,
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            timeout_secs: default_timeout_secs(),
            drain_interval_ms: default_drain_interval_ms(),
            kill_on_timeout: default_kill_on_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VcsConfig {
    #[serde(default = "default_vcs_program")]
    pub program: String,
}

impl Default for VcsConfig {
    fn default() -> Self {
        VcsConfig {
            program: default_vcs_program(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            changelog: default_changelog(),
            scripts: ScriptsConfig::default(),
            execution: ExecutionConfig::default(),
            vcs: VcsConfig::default(),
        }
    }
}

impl Config {
    /// Parses configuration from TOML text and validates it
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| ShipitError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.execution.timeout_secs == 0 {
            return Err(ShipitError::config("execution.timeout_secs must be positive"));
        }
        if self.execution.drain_interval_ms == 0 {
            return Err(ShipitError::config(
                "execution.drain_interval_ms must be positive",
            ));
        }
        if self.changelog.trim().is_empty() {
            return Err(ShipitError::config("changelog must not be empty"));
        }
        Ok(())
    }

    pub fn changelog_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.changelog)
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `shipit.toml` in the project directory
/// 3. `shipit.toml` in the user config directory
/// 4. Default configuration if no file found
///
/// # Arguments
/// * `config_path` - Optional path to custom configuration file
/// * `project_dir` - Directory of the project being built
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If a file exists but cannot be read, parsed or validated
pub fn load_config(config_path: Option<&Path>, project_dir: &Path) -> Result<Config> {
    let candidate = if let Some(path) = config_path {
        Some(path.to_path_buf())
    } else if project_dir.join(CONFIG_FILE_NAME).exists() {
        Some(project_dir.join(CONFIG_FILE_NAME))
    } else {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    };

    let Some(path) = candidate else {
        return Ok(Config::default());
    };

    tracing::debug!(path = %path.display(), "loading configuration");
    let text = fs::read_to_string(&path).map_err(|e| {
        ShipitError::config(format!("cannot read '{}': {}", path.display(), e))
    })?;
    Config::from_toml(&text).map_err(|e| match e {
        ShipitError::Config(msg) => ShipitError::config(format!("in '{}': {}", path.display(), msg)),
        other => other,
    })
}
