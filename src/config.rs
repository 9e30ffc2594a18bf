use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::error::ConfigError;
use crate::models::{DeletePolicy, OwnerId};
use crate::recurrence::MonthlyFallback;

pub const ENV_DATA_DIR: &str = "CADENCE_DATA_DIR";
pub const ENV_OWNER: &str = "CADENCE_OWNER";
pub const ENV_HORIZON_DAYS: &str = "CADENCE_HORIZON_DAYS";
pub const ENV_MONTHLY_FALLBACK: &str = "CADENCE_MONTHLY_FALLBACK";
pub const ENV_DELETE_POLICY: &str = "CADENCE_DELETE_POLICY";

/// Largest accepted horizon, about ten years.
pub const MAX_HORIZON_DAYS: i64 = 3650;

/// Name of the optional settings file inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Runtime settings.
///
/// Built from defaults, then `config.json` in the data directory, then
/// `CADENCE_*` environment variables.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding `tasks.json`, `templates.json` and `last_run.json`.
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// The acting user. Without one the engine does nothing.
    pub owner: Option<OwnerId>,
    /// How many days ahead instances are materialized.
    pub horizon_days: i64,
    pub monthly_fallback: MonthlyFallback,
    pub delete_policy: DeletePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("."),
            owner: None,
            horizon_days: EngineConfig::DEFAULT_HORIZON_DAYS,
            monthly_fallback: MonthlyFallback::default(),
            delete_policy: DeletePolicy::default(),
        }
    }
}

/// Returns the data directory.
///
/// The path is determined in the following order:
/// 1. `CADENCE_DATA_DIR` environment variable.
/// 2. `~/.local/share/cadence` (on Linux).
/// 3. `.` (fallback).
pub fn data_dir() -> PathBuf {
    std::env::var(ENV_DATA_DIR).map(PathBuf::from).unwrap_or_else(|_| {
        let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("cadence");
        p
    })
}

impl Config {
    /// Loads the configuration for the default data directory.
    pub fn load() -> Result<Config, ConfigError> {
        Config::load_from(data_dir())
    }

    /// Loads the configuration rooted at `dir`, applying environment overrides.
    pub fn load_from(dir: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let dir = dir.as_ref();
        let mut config = Config::read_file(&dir.join(CONFIG_FILE))?;
        config.data_dir = dir.to_path_buf();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let s = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&s).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(owner) = std::env::var(ENV_OWNER) {
            let owner = owner.trim().to_string();
            self.owner = if owner.is_empty() { None } else { Some(owner) };
        }
        if let Ok(value) = std::env::var(ENV_HORIZON_DAYS) {
            self.horizon_days = value
                .trim()
                .parse::<i64>()
                .map_err(|e| invalid(ENV_HORIZON_DAYS, value.clone(), e.to_string()))?;
        }
        if let Ok(value) = std::env::var(ENV_MONTHLY_FALLBACK) {
            self.monthly_fallback = value
                .parse()
                .map_err(|reason| invalid(ENV_MONTHLY_FALLBACK, value.clone(), reason))?;
        }
        if let Ok(value) = std::env::var(ENV_DELETE_POLICY) {
            self.delete_policy = value
                .parse()
                .map_err(|reason| invalid(ENV_DELETE_POLICY, value.clone(), reason))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=MAX_HORIZON_DAYS).contains(&self.horizon_days) {
            let reason = format!("must be between 0 and {}", MAX_HORIZON_DAYS);
            return Err(invalid("horizon_days", self.horizon_days.to_string(), reason));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            horizon_days: self.horizon_days,
            monthly_fallback: self.monthly_fallback,
        }
    }
}

fn invalid(key: &'static str, value: String, reason: String) -> ConfigError {
    ConfigError::Invalid { key, value, reason }
}
