use keystash_auth::{AuthConfig, ConfigError};
use keystash_cache::CacheConfig;
use serde::{Deserialize, Serialize};

/// Config file read when neither `--config` nor `KEYSTASH_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "keystash.toml";

const VALID_LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Checks every section.
    ///
    /// A missing `auth.secret_key` is accepted here: commands that only touch
    /// the cache run without one, and the rest fail when they build the
    /// factory.
    pub fn validate(&self) -> Result<(), String> {
        self.cache.validate()?;

        match self.auth.validate() {
            Ok(()) | Err(ConfigError::Missing(_)) => {}
            Err(e) => return Err(e.to_string()),
        }

        let lvl = self.logging.level.to_ascii_lowercase();
        if !VALID_LOG_LEVELS.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {VALID_LOG_LEVELS:?}"));
        }
        Ok(())
    }

    /// The configuration as TOML with the secret key masked.
    pub fn to_redacted_toml(&self) -> Result<String, toml::ser::Error> {
        let mut shown = self.clone();
        if !shown.auth.secret_key.is_empty() {
            shown.auth.secret_key = "<redacted>".into();
        }
        toml::to_string_pretty(&shown)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Log lines go to stderr, but a CLI should still be quiet by default.
fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use std::path::PathBuf;

    use config::{Config, Environment, File};

    use super::AppConfig;

    /// Loads the configuration.
    ///
    /// Sources, later ones winning:
    /// 1. The TOML file at `path`, if it exists
    /// 2. Environment variables such as `KEYSTASH__CACHE__BACKEND=redis`
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(super::DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        builder = builder.add_source(
            Environment::with_prefix("KEYSTASH")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
