use std::{io::Read, time::Duration};

use {
    anyhow::{Context, bail},
    clap::Subcommand,
    secrecy::ExposeSecret,
    serde_json::{Value, json},
    strongbox_config::{EncryptionConfig, EndpointOverrides, KeySource, StrongboxConfig},
    strongbox_crypto::{Credentials, EncryptionKey, key::decode_salt},
    strongbox_store::{IntegrationType, SqliteRecordStore, sqlite::open_pool},
    strongbox_vault::{
        CredentialUpdate, CredentialVault, Endpoints, HttpConnectionValidator, LocalBoundary,
        NewCredential, VaultError,
    },
    tracing::info,
};

pub type Vault = CredentialVault<LocalBoundary<SqliteRecordStore>, SqliteRecordStore>;

#[derive(Subcommand)]
pub enum CredentialAction {
    /// List credentials (metadata only), newest first.
    List,
    /// Show one credential's metadata.
    Show { id: String },
    /// Encrypt and store a new credential.
    Create {
        /// Integration: google, slack, jira, n8n, github, notion, custom.
        #[arg(long = "type")]
        integration_type: IntegrationType,
        #[arg(long)]
        label: String,
        /// JSON object of secret fields, or `-` to read it from stdin.
        #[arg(long)]
        credentials: String,
        /// Expiry as unix seconds. Informational only.
        #[arg(long)]
        expires_at: Option<i64>,
    },
    /// Change a credential's label and/or secret fields.
    Update {
        id: String,
        #[arg(long)]
        label: Option<String>,
        /// JSON object of secret fields, or `-` to read it from stdin.
        #[arg(long)]
        credentials: Option<String>,
    },
    /// Delete a credential.
    Delete { id: String },
    /// Print a credential's decrypted fields.
    Reveal { id: String },
    /// Run the integration's connection test.
    Validate { id: String },
    /// Re-encrypt every legacy base64 credential.
    Migrate,
}

/// Build the encryption key from config.
pub fn load_key(encryption: &EncryptionConfig) -> anyhow::Result<EncryptionKey> {
    let key = match encryption.key_source()? {
        KeySource::Raw(key) => EncryptionKey::from_base64(key.expose_secret())
            .context("encryption.key is not a base64 32-byte key")?,
        KeySource::Passphrase {
            passphrase,
            salt,
            kdf,
        } => {
            let salt = decode_salt(salt).context("encryption.salt is not valid base64")?;
            EncryptionKey::derive(passphrase.expose_secret().as_bytes(), &salt, kdf)
                .context("deriving key from passphrase")?
        },
    };
    Ok(key)
}

fn endpoints(overrides: &EndpointOverrides) -> Endpoints {
    let defaults = Endpoints::default();
    Endpoints {
        slack: overrides.slack.clone().unwrap_or(defaults.slack),
        github: overrides.github.clone().unwrap_or(defaults.github),
        notion: overrides.notion.clone().unwrap_or(defaults.notion),
        google: overrides.google.clone().unwrap_or(defaults.google),
    }
}

/// Open the database, apply migrations, and wire the vault.
pub async fn open_vault(config: &StrongboxConfig) -> anyhow::Result<Vault> {
    let key = load_key(&config.encryption)?;

    let pool = open_pool(
        &config.database.url,
        config.database.max_connections,
        Duration::from_secs(config.database.acquire_timeout_secs),
    )
    .await
    .context("opening credential database")?;
    strongbox_store::run_migrations(&pool)
        .await
        .context("running credential migrations")?;

    let validator = HttpConnectionValidator::new(
        Duration::from_secs(config.validation.timeout_secs),
        endpoints(&config.validation.endpoints),
    )
    .context("building HTTP client")?;

    Ok(CredentialVault::local(
        key,
        SqliteRecordStore::new(pool),
        validator,
    ))
}

/// Parse a JSON object argument. `-` reads from stdin.
fn read_credentials(arg: &str) -> anyhow::Result<Credentials> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading credentials from stdin")?;
        return parse_credentials(&buf);
    }
    parse_credentials(arg)
}

fn parse_credentials(raw: &str) -> anyhow::Result<Credentials> {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(Value::Object(map)) => Ok(Credentials::from(map)),
        Ok(_) => bail!("credentials must be a JSON object"),
        // serde_json errors quote the offending input, which may be a secret.
        Err(e) => bail!(
            "credentials are not valid JSON (line {}, column {})",
            e.line(),
            e.column()
        ),
    }
}

pub async fn handle_credential(
    vault: &Vault,
    owner: &str,
    action: CredentialAction,
) -> anyhow::Result<Value> {
    let output = match action {
        CredentialAction::List => json!(vault.list_credentials(owner).await?),
        CredentialAction::Show { id } => json!(vault.get_credential(&id, owner).await?),
        CredentialAction::Create {
            integration_type,
            label,
            credentials,
            expires_at,
        } => {
            let credentials = read_credentials(&credentials)?;
            let mut new = NewCredential::new(integration_type, label, credentials);
            new.expires_at = expires_at;
            json!(vault.create_credential(owner, new).await?)
        },
        CredentialAction::Update {
            id,
            label,
            credentials,
        } => {
            let update = CredentialUpdate {
                label,
                credentials: credentials.as_deref().map(read_credentials).transpose()?,
            };
            match vault.update_credential(&id, owner, update).await? {
                Some(credential) => json!(credential),
                None => return Err(VaultError::NotFoundOrAccessDenied.into()),
            }
        },
        CredentialAction::Delete { id } => {
            let deleted = vault.delete_credential(&id, owner).await?;
            json!({ "id": id, "deleted": deleted })
        },
        CredentialAction::Reveal { id } => {
            info!(credential_id = %id, owner_id = owner, "revealing credential on stdout");
            json!(vault.get_decrypted_credentials(&id, owner).await?)
        },
        CredentialAction::Validate { id } => {
            let valid = vault.validate_credential(&id, owner).await?;
            json!({ "id": id, "valid": valid })
        },
        CredentialAction::Migrate => {
            let migrated = vault.migrate_all_legacy_credentials(owner).await?;
            json!({ "migrated": migrated })
        },
    };
    Ok(output)
}
