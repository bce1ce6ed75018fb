//! Service Configuration Module
//!
//! Provides layered configuration loading for Confluence services.
//! Compiled defaults are overlaid by an optional file and then by
//! prefixed environment variables.

use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Separator between nested keys in environment overrides
/// (`CONFLUENCE_SCHEDULER__BATCH_SIZE` -> `scheduler.batch_size`).
pub const ENV_SEPARATOR: &str = "__";

/// Load a configuration struct from defaults, an optional file and the environment.
///
/// `path` must exist when given. Environment variables are read with
/// `{env_prefix}_` in front of the key and [`ENV_SEPARATOR`] between nested keys.
pub fn load_layered<T>(path: Option<&Path>, env_prefix: &str) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    let defaults = Config::try_from(&T::default())
        .context("Failed to serialize configuration defaults")?;

    let mut builder = Config::builder().add_source(defaults);

    if let Some(path) = path {
        info!("Loading configuration file: {:?}", path);
        builder = builder.add_source(File::from(path).required(true));
    } else {
        debug!("No configuration file given, using defaults");
    }

    builder = builder.add_source(
        Environment::with_prefix(env_prefix)
            .prefix_separator("_")
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Pick the configuration file to load.
///
/// The path named by `env_var` wins when set. Otherwise `default_path` is used
/// if it exists on disk, and `None` means "defaults plus environment only".
pub fn resolve_config_path(env_var: &str, default_path: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(env_var) {
        return Some(PathBuf::from(path));
    }

    let default = PathBuf::from(default_path);
    if default.exists() {
        Some(default)
    } else {
        warn!("Config file {:?} not found, using defaults", default);
        None
    }
}

/// Expand `~` and `$VARS` in a configured path.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).context("Failed to expand path")?;
    Ok(PathBuf::from(expanded.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestConfig {
        name: String,
        scheduler: TestScheduler,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestScheduler {
        batch_size: usize,
        interval_ms: u64,
    }

    impl Default for TestConfig {
        fn default() -> Self {
            Self {
                name: "default".to_string(),
                scheduler: TestScheduler {
                    batch_size: 10,
                    interval_ms: 5000,
                },
            }
        }
    }

    #[test]
    fn test_defaults_without_file() {
        let config: TestConfig = load_layered(None, "CFGTEST_DEFAULTS").unwrap();
        assert_eq!(config, TestConfig::default());
    }

    #[test]
    fn test_file_overrides_only_named_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("engine.toml");

        fs::write(
            &config_path,
            r#"
[scheduler]
batch_size = 4
"#,
        )
        .unwrap();

        let config: TestConfig = load_layered(Some(&config_path), "CFGTEST_FILE").unwrap();

        assert_eq!(config.name, "default");
        assert_eq!(config.scheduler.batch_size, 4);
        assert_eq!(config.scheduler.interval_ms, 5000);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        let result: Result<TestConfig> = load_layered(Some(&missing), "CFGTEST_MISSING");
        assert!(result.is_err());
    }

    #[test]
    fn test_environment_override() {
        std::env::set_var("CFGTEST_ENV_SCHEDULER__INTERVAL_MS", "250");

        let config: TestConfig = load_layered(None, "CFGTEST_ENV").unwrap();
        assert_eq!(config.scheduler.interval_ms, 250);
        assert_eq!(config.scheduler.batch_size, 10);

        std::env::remove_var("CFGTEST_ENV_SCHEDULER__INTERVAL_MS");
    }

    #[test]
    fn test_resolve_prefers_env_var() {
        std::env::set_var("CFGTEST_PATH", "/tmp/confluence-test.toml");
        let path = resolve_config_path("CFGTEST_PATH", "does/not/exist.toml");
        assert_eq!(path, Some(PathBuf::from("/tmp/confluence-test.toml")));
        std::env::remove_var("CFGTEST_PATH");

        assert_eq!(resolve_config_path("CFGTEST_PATH_UNSET", "does/not/exist.toml"), None);
    }

    #[test]
    fn test_expand_path_env_var() {
        std::env::set_var("CFGTEST_DATA_DIR", "/var/lib/confluence");
        let path = expand_path("$CFGTEST_DATA_DIR/trades.jsonl").unwrap();
        assert_eq!(path, PathBuf::from("/var/lib/confluence/trades.jsonl"));
        std::env::remove_var("CFGTEST_DATA_DIR");
    }
}
