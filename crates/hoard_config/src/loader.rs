//! Configuration file loading, session overrides and validation.

use crate::error::ConfigError;
use crate::types::CacheConfig;
use hoard_common::HashAlgorithm;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Session property naming an explicit configuration file.
pub const CONFIG_PATH_PROPERTY: &str = "hoard.configPath";
/// Session property overriding `enabled`.
pub const ENABLED_PROPERTY: &str = "hoard.enabled";
/// Session property overriding `remote.save-to-remote`.
pub const SAVE_TO_REMOTE_PROPERTY: &str = "hoard.remote.save";
/// Session property overriding `fail-fast`.
pub const FAIL_FAST_PROPERTY: &str = "hoard.failFast";
/// Session property overriding `save-final`.
pub const SAVE_FINAL_PROPERTY: &str = "hoard.save.final";
/// Session property overriding `baseline.url`.
pub const BASELINE_URL_PROPERTY: &str = "hoard.baselineUrl";

/// Location of the configuration file relative to the build root.
const DEFAULT_CONFIG_PATH: &str = ".hoard/cache.toml";

/// Loads and validates `<build_root>/.hoard/cache.toml`.
pub fn load_config(build_root: &Path) -> Result<CacheConfig, ConfigError> {
    let content = std::fs::read_to_string(build_root.join(DEFAULT_CONFIG_PATH))?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<CacheConfig, ConfigError> {
    let config: CacheConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Loads the configuration for a build session.
///
/// The file named by `hoard.configPath` is used when set, otherwise the
/// default location under `build_root`. A missing default file yields the
/// default configuration. Session properties are applied on top before
/// validation.
pub fn load_session_config(
    build_root: &Path,
    properties: &BTreeMap<String, String>,
) -> Result<CacheConfig, ConfigError> {
    let explicit = properties.get(CONFIG_PATH_PROPERTY).map(PathBuf::from);
    let path = explicit
        .clone()
        .map(|p| if p.is_absolute() { p } else { build_root.join(p) })
        .unwrap_or_else(|| build_root.join(DEFAULT_CONFIG_PATH));

    let mut config = if path.exists() || explicit.is_some() {
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?
    } else {
        tracing::debug!(path = %path.display(), "no cache configuration found, using defaults");
        CacheConfig::default()
    };

    apply_overrides(&mut config, properties)?;
    validate_config(&config)?;
    Ok(config)
}

/// Applies session property overrides to a configuration.
pub fn apply_overrides(
    config: &mut CacheConfig,
    properties: &BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    if let Some(v) = bool_property(properties, ENABLED_PROPERTY)? {
        config.enabled = v;
    }
    if let Some(v) = bool_property(properties, SAVE_TO_REMOTE_PROPERTY)? {
        config.remote.save_to_remote = v;
    }
    if let Some(v) = bool_property(properties, FAIL_FAST_PROPERTY)? {
        config.fail_fast = v;
    }
    if let Some(v) = bool_property(properties, SAVE_FINAL_PROPERTY)? {
        config.save_final = v;
    }
    if let Some(url) = properties.get(BASELINE_URL_PROPERTY) {
        let url = url.trim();
        config.baseline.url = (!url.is_empty()).then(|| url.to_string());
    }
    Ok(())
}

fn bool_property(
    properties: &BTreeMap<String, String>,
    name: &str,
) -> Result<Option<bool>, ConfigError> {
    match properties.get(name).map(|v| v.trim()) {
        None => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(v) => Err(ConfigError::ValidationError(format!(
            "property {name} must be true or false, got '{v}'"
        ))),
    }
}

/// Validates that required fields are present and values are consistent.
fn validate_config(config: &CacheConfig) -> Result<(), ConfigError> {
    HashAlgorithm::from_id(&config.hash_algorithm)
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    if config.remote.enabled && config.remote.url.as_deref().map_or(true, str::is_empty) {
        return Err(ConfigError::MissingField("remote.url".to_string()));
    }
    if config.local.max_builds_cached == 0 {
        return Err(ConfigError::ValidationError(
            "local.max-builds-cached must be at least 1".to_string(),
        ));
    }
    for pattern in &config.output.exclude_patterns {
        regex::Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
