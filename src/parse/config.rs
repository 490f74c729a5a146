use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

use crate::error::ConfigError;

fn default_tick_ms() -> u64 { 1000 }
fn default_heartbeat_secs() -> u64 { 3 }
fn default_log_level() -> String { "info".to_string() }

/// Pool-wide settings. Nothing here is per worker.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SupervisorConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            tick_ms: default_tick_ms(),
            heartbeat_secs: default_heartbeat_secs(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl SupervisorConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn level(&self) -> Result<tracing::Level, ConfigError> {
        self.log_level.parse().map_err(|_| ConfigError::Invalid {
            field: "log_level",
            message: format!("unknown level `{}`", self.log_level),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.heartbeat_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "heartbeat_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        self.level()?;
        Ok(())
    }

    pub fn from_yaml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let parsed: SupervisorConfig =
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        parsed.validate()?;
        Ok(parsed)
    }
}

/*
    @@@
    @parser();
    . Reads the YAML file at `path`. I/O errors (missing file, permission denied) come back as ConfigError::Read.
    . Hands the text to serde_yaml; malformed YAML or out-of-range values are returned as errors.
*/
pub fn parser(path: &Path) -> Result<SupervisorConfig, ConfigError> {
    let yaml_file = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    SupervisorConfig::from_yaml(path, &yaml_file)
}
