//! Configuration Loader
//!
//! Layers, lowest precedence first:
//! 1. `BeaconConfig::default()`
//! 2. TOML file at `BEACON_CONFIG_PATH` (default `config/beacon.toml`, optional)
//! 3. `BEACON__<SECTION>__<KEY>` environment variables
//! 4. `DATABASE_URL` / `REDIS_URL`

use super::error::{ConfigResult, ConfigurationError};
use super::BeaconConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_CONFIG_PATH: &str = "config/beacon.toml";

pub struct ConfigManager {
    config: BeaconConfig,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from the default locations and the environment
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let explicit = env::var("BEACON_CONFIG_PATH").ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        // An explicitly named file must exist; the default one may be absent.
        Self::load_from(Some(&path), explicit.is_some(), true)
    }

    /// Load configuration from `path`, optionally layering environment variables
    pub fn load_from(
        path: Option<&Path>,
        file_required: bool,
        read_env: bool,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let defaults = Config::try_from(&BeaconConfig::default())
            .map_err(|e| ConfigurationError::load_error("defaults", e))?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            debug!(path = %path.display(), required = file_required, "Loading configuration file");
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(file_required),
            );
        }

        if read_env {
            builder = builder
                .add_source(
                    Environment::with_prefix("BEACON")
                        .prefix_separator("__")
                        .separator("__")
                        .try_parsing(true),
                )
                .set_override_option("database.url", env::var("DATABASE_URL").ok())
                .map_err(|e| ConfigurationError::load_error("DATABASE_URL", e))?
                .set_override_option("redis.url", env::var("REDIS_URL").ok())
                .map_err(|e| ConfigurationError::load_error("REDIS_URL", e))?;
        }

        let source_name = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults".to_string());
        let config: BeaconConfig = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| ConfigurationError::load_error(source_name, e))?;

        config.validate()?;

        debug!(
            reconciler_enabled = config.reconciler.enabled,
            cycle_interval_seconds = config.reconciler.cycle_interval_seconds,
            max_connections = config.database.max_connections,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            source_path: path.map(Path::to_path_buf),
        }))
    }

    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_optional_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let manager = ConfigManager::load_from(Some(&path), false, false).unwrap();
        assert_eq!(manager.config().reconciler.cycle_interval_seconds, 60);
        assert_eq!(manager.config().redis.key_prefix, "beacon");
    }

    #[test]
    fn test_missing_required_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let result = ConfigManager::load_from(Some(&path), true, false);
        assert!(matches!(result, Err(ConfigurationError::LoadError { .. })));
    }

    #[test]
    fn test_file_overrides_defaults_per_field() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[reconciler]
cycle_interval_seconds = 30

[cache]
max_feed_ttl_seconds = 120

[redis]
url = "redis://cache:6379/2"
"#
        )
        .unwrap();

        let manager = ConfigManager::load_from(Some(file.path()), true, false).unwrap();
        let config = manager.config();
        assert_eq!(config.reconciler.cycle_interval_seconds, 30);
        assert_eq!(config.reconciler.call_timeout_ms, 5_000);
        assert_eq!(config.cache.max_feed_ttl_seconds, 120);
        assert_eq!(config.cache.config_data_ttl_seconds, 86_400);
        assert_eq!(config.redis.url, "redis://cache:6379/2");
        assert_eq!(manager.source_path(), Some(file.path()));
    }

    #[test]
    fn test_invalid_file_value_fails_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[reconciler]\ncall_timeout_ms = 0").unwrap();

        let result = ConfigManager::load_from(Some(file.path()), true, false);
        assert!(matches!(result, Err(ConfigurationError::InvalidValue { .. })));
    }
}
