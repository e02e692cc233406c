//! Layered configuration: optional TOML file, then `AVATAR_REGISTRY_*`
//! environment variables.

use anyhow::{Context, Result};
use avatar_registry::{Identity, RegistryConfig, DEFAULT_EVENT_CAPACITY};
use config::{Config, File as ConfigFile};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "avatar-registry.toml";
pub const DEFAULT_STATE_PATH: &str = "./data/avatar-registry.json";
pub const ENV_PREFIX: &str = "AVATAR_REGISTRY";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub admin: Identity,
    pub state_path: PathBuf,
    pub log_level: String,
    pub log_format: String,
    pub event_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin: Identity::NULL,
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            log_level: "warn".to_string(),
            log_format: "compact".to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Load configuration. An explicit path must exist; otherwise the
    /// default file is used when present.
    pub fn load(config_path_override: Option<&Path>) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.to_path_buf())
            }
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|path| path.exists()),
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(environment(None));

        let config = builder.build()?;
        Self::from_config(&config)
    }

    fn from_config(config: &Config) -> Result<Self> {
        let defaults = Self::default();

        let admin = match get_string_value(config, &["admin"]) {
            Some(value) => value
                .parse::<Identity>()
                .with_context(|| format!("Invalid admin identity {value:?}"))?,
            None => defaults.admin,
        };

        let event_capacity = match get_string_value(config, &["event_capacity"]) {
            Some(value) => value
                .parse::<usize>()
                .with_context(|| format!("Invalid event_capacity {value:?}"))?,
            None => defaults.event_capacity,
        };

        Ok(Self {
            admin,
            state_path: get_string_value(config, &["state_path", "state"])
                .map(PathBuf::from)
                .unwrap_or(defaults.state_path),
            log_level: get_string_value(config, &["log_level"]).unwrap_or(defaults.log_level),
            log_format: get_string_value(config, &["log_format"]).unwrap_or(defaults.log_format),
            event_capacity,
        })
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            admin: self.admin,
            event_capacity: self.event_capacity,
        }
    }
}

/// `AVATAR_REGISTRY_STATE_PATH` maps to `state_path`, and so on. `vars`
/// replaces the process environment when given.
fn environment(vars: Option<config::Map<String, String>>) -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX).source(vars)
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
