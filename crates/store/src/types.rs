//! Credential row types.

use serde::{Deserialize, Serialize};

/// Third-party integrations a credential can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationType {
    Google,
    Slack,
    Jira,
    N8n,
    Github,
    Notion,
    Custom,
}

impl IntegrationType {
    pub const ALL: [Self; 7] = [
        Self::Google,
        Self::Slack,
        Self::Jira,
        Self::N8n,
        Self::Github,
        Self::Notion,
        Self::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Slack => "slack",
            Self::Jira => "jira",
            Self::N8n => "n8n",
            Self::Github => "github",
            Self::Notion => "notion",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntegrationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown integration type: {s}"))
    }
}

/// A full stored row, including the opaque encrypted payload.
///
/// Only the encryption boundary and the vault service handle this type;
/// callers outside the vault see [`Credential`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: String,
    pub owner_id: String,
    pub integration_type: IntegrationType,
    pub label: String,
    pub encrypted_payload: String,
    /// Unix seconds. Informational only.
    pub expires_at: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl CredentialRecord {
    /// Drop the payload, keeping only metadata.
    pub fn into_metadata(self) -> Credential {
        Credential {
            id: self.id,
            owner_id: self.owner_id,
            integration_type: self.integration_type,
            label: self.label,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Credential metadata as exposed to callers. Never carries the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub owner_id: String,
    pub integration_type: IntegrationType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Values for a new row. The store assigns `id` and timestamps.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub owner_id: String,
    pub integration_type: IntegrationType,
    pub label: String,
    pub encrypted_payload: String,
    pub expires_at: Option<i64>,
}

/// Columns to overwrite. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub label: Option<String>,
    pub encrypted_payload: Option<String>,
    /// Only apply when the stored payload still equals this value.
    pub expected_payload: Option<String>,
}

/// Ownership filter applied to every statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerFilter {
    pub owner_id: String,
    pub id: Option<String>,
}

impl OwnerFilter {
    /// All rows owned by `owner_id`.
    pub fn owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            id: None,
        }
    }

    /// The single row `id`, if and only if `owner_id` owns it.
    pub fn record(id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            id: Some(id.into()),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integration_type_parses_case_insensitively() {
        assert_eq!("Slack".parse::<IntegrationType>(), Ok(IntegrationType::Slack));
        assert_eq!(" n8n ".parse::<IntegrationType>(), Ok(IntegrationType::N8n));
        assert!("dropbox".parse::<IntegrationType>().is_err());
    }

    #[test]
    fn integration_type_round_trips_through_display() {
        for t in IntegrationType::ALL {
            assert_eq!(t.to_string().parse::<IntegrationType>(), Ok(t));
        }
    }

    #[test]
    fn integration_type_serde_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&IntegrationType::Github).unwrap(),
            "\"github\""
        );
    }
}
