//! Configuration loading and env substitution.
//!
//! Config files: `strongbox.toml`, `strongbox.yaml`, or `strongbox.json`
//! Searched in `./` then `~/.config/strongbox/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw
//! file text before parsing.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::ConfigError,
    loader::{
        ENV_DATABASE_URL, ENV_ENCRYPTION_KEY, apply_env_overrides, config_dir, discover_and_load,
        load_config, load_or_discover,
    },
    schema::{
        DatabaseConfig, EncryptionConfig, EndpointOverrides, KeySource, StrongboxConfig,
        ValidationConfig,
    },
};
