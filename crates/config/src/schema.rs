/// Config schema: database, key material, connection validation.
use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    strongbox_crypto::KdfParams,
};

use crate::error::ConfigError;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StrongboxConfig {
    pub database: DatabaseConfig,
    pub encryption: EncryptionConfig,
    pub validation: ValidationConfig,
}

impl StrongboxConfig {
    /// Reject configs that can not start a vault.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Invalid("database.url is empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".into(),
            ));
        }
        self.encryption.key_source()?;
        Ok(())
    }
}

/// Record store connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx SQLite URL.
    pub url: String,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection.
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://strongbox.db?mode=rwc".into(),
            max_connections: 5,
            acquire_timeout_secs: 10,
        }
    }
}

/// Key material. Exactly one of `key` or `passphrase` + `salt` must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Base64-encoded 32-byte key.
    pub key: Option<Secret<String>>,
    pub passphrase: Option<Secret<String>>,
    /// Base64-encoded salt, at least 16 bytes decoded.
    pub salt: Option<String>,
    pub kdf: KdfParams,
}

/// Where the vault key comes from.
#[derive(Debug)]
pub enum KeySource<'a> {
    Raw(&'a Secret<String>),
    Passphrase {
        passphrase: &'a Secret<String>,
        salt: &'a str,
        kdf: &'a KdfParams,
    },
}

fn present(secret: &Option<Secret<String>>) -> Option<&Secret<String>> {
    secret
        .as_ref()
        .filter(|s| !s.expose_secret().trim().is_empty())
}

impl EncryptionConfig {
    pub fn key_source(&self) -> Result<KeySource<'_>, ConfigError> {
        match (present(&self.key), present(&self.passphrase)) {
            (Some(_), Some(_)) => Err(ConfigError::Invalid(
                "set either encryption.key or encryption.passphrase, not both".into(),
            )),
            (Some(key), None) => Ok(KeySource::Raw(key)),
            (None, Some(passphrase)) => {
                let salt = self
                    .salt
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        ConfigError::Invalid(
                            "encryption.passphrase requires encryption.salt".into(),
                        )
                    })?;
                Ok(KeySource::Passphrase {
                    passphrase,
                    salt,
                    kdf: &self.kdf,
                })
            },
            (None, None) => Err(ConfigError::MissingKey),
        }
    }
}

/// Connection test settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub timeout_secs: u64,
    pub endpoints: EndpointOverrides,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            endpoints: EndpointOverrides::default(),
        }
    }
}

/// Base URL overrides for hosted integration APIs. Unset means the public API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointOverrides {
    pub slack: Option<String>,
    pub github: Option<String>,
    pub notion: Option<String>,
    pub google: Option<String>,
}
