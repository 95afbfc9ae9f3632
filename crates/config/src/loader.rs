use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, info},
};

use crate::{env_subst::substitute_env, error::ConfigError, schema::StrongboxConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "strongbox.toml",
    "strongbox.yaml",
    "strongbox.yml",
    "strongbox.json",
];

/// Overrides `database.url`.
pub const ENV_DATABASE_URL: &str = "STRONGBOX_DATABASE_URL";
/// Overrides `encryption.key`.
pub const ENV_ENCRYPTION_KEY: &str = "STRONGBOX_ENCRYPTION_KEY";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<StrongboxConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./strongbox.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/strongbox/strongbox.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to defaults when no file exists. A file that exists but does
/// not parse is an error.
pub fn discover_and_load() -> Result<StrongboxConfig, ConfigError> {
    let config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)?
        },
        None => {
            debug!("no config file found, using defaults");
            StrongboxConfig::default()
        },
    };
    Ok(apply_env_overrides(config))
}

/// Load `path` when given, otherwise discover. Env overrides apply either way.
pub fn load_or_discover(path: Option<&Path>) -> Result<StrongboxConfig, ConfigError> {
    match path {
        Some(path) => Ok(apply_env_overrides(load_config(path)?)),
        None => discover_and_load(),
    }
}

/// Apply `STRONGBOX_*` environment overrides.
pub fn apply_env_overrides(config: StrongboxConfig) -> StrongboxConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: StrongboxConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> StrongboxConfig {
    if let Some(url) = lookup(ENV_DATABASE_URL).filter(|v| !v.trim().is_empty()) {
        info!(var = ENV_DATABASE_URL, "database url overridden from environment");
        config.database.url = url;
    }
    if let Some(key) = lookup(ENV_ENCRYPTION_KEY).filter(|v| !v.trim().is_empty()) {
        info!(var = ENV_ENCRYPTION_KEY, "encryption key overridden from environment");
        config.encryption.key = Some(Secret::new(key));
        // An explicit key wins over any configured passphrase.
        config.encryption.passphrase = None;
    }
    config
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let mut dirs = vec![PathBuf::from(".")];
    dirs.extend(config_dir());
    find_in(&dirs)
}

fn find_in(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/strongbox/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "strongbox").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<StrongboxConfig, ConfigError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "json" => serde_json::from_str(raw).map_err(|e| parse_err(e.to_string())),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}
