use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{ExclusionSet, SourceId};

const CONFIG_DIR_NAME: &str = "winup";
const CONFIG_FILE_NAME: &str = "config.toml";
const HISTORY_FILE_NAME: &str = "history.sqlite3";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Run configuration, loaded once at startup and passed by reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub winget: SourceSettings,

    #[serde(default)]
    pub chocolatey: SourceSettings,

    #[serde(default)]
    pub store: SourceSettings,
}

impl SourcesConfig {
    pub fn get(&self, source: SourceId) -> &SourceSettings {
        match source {
            SourceId::Winget => &self.winget,
            SourceId::Chocolatey => &self.chocolatey,
            SourceId::Store => &self.store,
        }
    }

    pub fn get_mut(&mut self, source: SourceId) -> &mut SourceSettings {
        match source {
            SourceId::Winget => &mut self.winget,
            SourceId::Chocolatey => &mut self.chocolatey,
            SourceId::Store => &mut self.store,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Package ids never upgraded from this source, matched case-insensitively.
    #[serde(default)]
    pub exclusions: Vec<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            exclusions: Vec::new(),
        }
    }
}

impl SourceSettings {
    pub fn exclusion_set(&self) -> ExclusionSet {
        ExclusionSet::new(&self.exclusions)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_list_timeout_secs")]
    pub list_timeout_secs: u64,

    /// No limit when unset; a slow installer is a delay, not a hang.
    #[serde(default)]
    pub upgrade_timeout_secs: Option<u64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            list_timeout_secs: default_list_timeout_secs(),
            upgrade_timeout_secs: None,
        }
    }
}

impl ExecutionConfig {
    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    pub fn upgrade_timeout(&self) -> Option<Duration> {
        self.upgrade_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: None,
        }
    }
}

impl HistoryConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| default_config_dir().join(HISTORY_FILE_NAME))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_list_timeout_secs() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Loads an explicit config file, or the default location when `path` is
    /// `None`. Only a missing default file falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        if !required && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for source in SourceId::ALL {
            let settings = self.sources.get(source);
            if settings.exclusions.iter().any(|id| id.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "sources.{source}.exclusions contains an empty entry"
                )));
            }
        }

        if self.execution.list_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "execution.list_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.execution.upgrade_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "execution.upgrade_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn default_path() -> PathBuf {
        default_config_dir().join(CONFIG_FILE_NAME)
    }
}

#[cfg(windows)]
fn default_config_dir() -> PathBuf {
    let base = std::env::var_os("ProgramData")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\ProgramData"));
    base.join(CONFIG_DIR_NAME)
}

#[cfg(not(windows))]
fn default_config_dir() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join(CONFIG_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Config, ConfigError};
    use crate::models::SourceId;

    #[test]
    fn defaults_enable_every_source() {
        let config = Config::default();
        for source in SourceId::ALL {
            assert!(config.sources.get(source).enabled);
            assert!(config.sources.get(source).exclusions.is_empty());
        }
        assert_eq!(config.execution.list_timeout(), Duration::from_secs(120));
        assert_eq!(config.execution.upgrade_timeout(), None);
        assert!(config.history.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parses_partial_file() {
        let config: Config = toml::from_str(
            r#"
[sources.chocolatey]
exclusions = ["GoogleChrome", "firefox"]

[sources.store]
enabled = false

[execution]
upgrade_timeout_secs = 1800
"#,
        )
        .unwrap();

        assert!(config.sources.winget.enabled);
        assert!(!config.sources.store.enabled);
        let exclusions = config.sources.chocolatey.exclusion_set();
        assert!(exclusions.contains("googlechrome"));
        assert_eq!(exclusions.len(), 2);
        assert_eq!(
            config.execution.upgrade_timeout(),
            Some(Duration::from_secs(1800))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_blank_exclusion() {
        let config: Config = toml::from_str(
            r#"
[sources.winget]
exclusions = ["Git.Git", "  "]
"#,
        )
        .unwrap();

        let error = config.validate().unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(ref message) if message.contains("winget")));
    }

    #[test]
    fn rejects_zero_timeouts() {
        let mut config = Config::default();
        config.execution.list_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.execution.upgrade_timeout_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[history]\nenabled = false\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert!(!config.history.enabled);
    }

    #[test]
    fn load_fails_for_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let error = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(error, ConfigError::Read { .. }));
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[execution\n").unwrap();

        let error = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn serializes_back_to_toml() {
        let config = Config::default();
        let rendered = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
