//! Per-integration connectivity checks.
//!
//! A validator receives decrypted credentials inside the boundary and
//! reports only a verdict plus a diagnostic. Diagnostics name missing fields
//! or HTTP statuses; they never echo credential values.

use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::{Client, RequestBuilder},
    serde::{Deserialize, Serialize},
    strongbox_crypto::Credentials,
    strongbox_store::IntegrationType,
    tracing::debug,
};

// Field names accepted for each secret, first present wins. Older records use
// camelCase keys.
const ACCESS_TOKEN: &[&str] = &["access_token", "accessToken"];
const API_KEY: &[&str] = &["api_key", "apiKey"];
const API_TOKEN: &[&str] = &["api_token", "apiToken"];
const SLACK_TOKEN: &[&str] = &[
    "bot_token",
    "botToken",
    "access_token",
    "accessToken",
    "token",
];
const GITHUB_TOKEN: &[&str] = &["access_token", "accessToken", "token"];
const NOTION_TOKEN: &[&str] = &[
    "api_key",
    "apiKey",
    "access_token",
    "accessToken",
    "token",
];
const JIRA_BASE: &[&str] = &["base_url", "baseUrl", "domain"];
const N8N_BASE: &[&str] = &["base_url", "baseUrl", "url"];

const NOTION_VERSION: &str = "2022-06-28";
const USER_AGENT: &str = concat!("strongbox/", env!("CARGO_PKG_VERSION"));

/// Result of a connectivity test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Tests whether a set of credentials can reach its integration.
#[async_trait]
pub trait ConnectionValidator: Send + Sync {
    async fn validate(
        &self,
        integration: IntegrationType,
        credentials: &Credentials,
    ) -> ValidationOutcome;
}

/// Base URLs of the hosted integration APIs.
///
/// Jira and n8n are self-hosted per tenant, so their base URL comes from the
/// credential itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub slack: String,
    pub github: String,
    pub notion: String,
    pub google: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            slack: "https://slack.com".into(),
            github: "https://api.github.com".into(),
            notion: "https://api.notion.com".into(),
            google: "https://oauth2.googleapis.com".into(),
        }
    }
}

/// [`ConnectionValidator`] that checks each integration's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpConnectionValidator {
    client: Client,
    endpoints: Endpoints,
}

#[derive(Deserialize)]
struct SlackAuthTest {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

fn join(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

impl HttpConnectionValidator {
    pub fn new(timeout: Duration, endpoints: Endpoints) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, endpoints })
    }

    /// Send `request` and map any 2xx to valid.
    async fn check(
        &self,
        integration: IntegrationType,
        request: RequestBuilder,
    ) -> ValidationOutcome {
        match request.send().await {
            Ok(resp) if resp.status().is_success() => ValidationOutcome::valid(),
            Ok(resp) => {
                ValidationOutcome::invalid(format!("{integration} returned HTTP {}", resp.status()))
            },
            Err(e) => ValidationOutcome::invalid(format!(
                "{integration} request failed: {}",
                e.without_url()
            )),
        }
    }

    async fn slack(&self, credentials: &Credentials) -> ValidationOutcome {
        let Some(token) = credentials.first_str(SLACK_TOKEN) else {
            return ValidationOutcome::invalid("slack credentials need a bot_token or token");
        };
        let url = join(&self.endpoints.slack, "/api/auth.test");
        let resp = match self.client.post(url).bearer_auth(token).send().await {
            Ok(resp) => resp,
            Err(e) => {
                return ValidationOutcome::invalid(format!(
                    "slack request failed: {}",
                    e.without_url()
                ));
            },
        };
        if !resp.status().is_success() {
            return ValidationOutcome::invalid(format!("slack returned HTTP {}", resp.status()));
        }
        match resp.json::<SlackAuthTest>().await {
            Ok(body) if body.ok => ValidationOutcome::valid(),
            Ok(body) => ValidationOutcome::invalid(format!(
                "slack rejected token: {}",
                body.error.as_deref().unwrap_or("unknown_error")
            )),
            Err(_) => ValidationOutcome::invalid("slack returned an unreadable response"),
        }
    }

    async fn github(&self, credentials: &Credentials) -> ValidationOutcome {
        let Some(token) = credentials.first_str(GITHUB_TOKEN) else {
            return ValidationOutcome::invalid("github credentials need an access_token or token");
        };
        let request = self
            .client
            .get(join(&self.endpoints.github, "/user"))
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json");
        self.check(IntegrationType::Github, request).await
    }

    async fn notion(&self, credentials: &Credentials) -> ValidationOutcome {
        let Some(token) = credentials.first_str(NOTION_TOKEN) else {
            return ValidationOutcome::invalid("notion credentials need an api_key or token");
        };
        let request = self
            .client
            .get(join(&self.endpoints.notion, "/v1/users/me"))
            .bearer_auth(token)
            .header("Notion-Version", NOTION_VERSION);
        self.check(IntegrationType::Notion, request).await
    }

    async fn google(&self, credentials: &Credentials) -> ValidationOutcome {
        let Some(token) = credentials.first_str(ACCESS_TOKEN) else {
            return ValidationOutcome::invalid("google credentials need an access_token");
        };
        // Form body keeps the token out of the URL and therefore out of error text.
        let request = self
            .client
            .post(join(&self.endpoints.google, "/tokeninfo"))
            .form(&[("access_token", token)]);
        self.check(IntegrationType::Google, request).await
    }

    async fn jira(&self, credentials: &Credentials) -> ValidationOutcome {
        let (Some(base), Some(email), Some(api_token)) = (
            credentials.first_str(JIRA_BASE),
            credentials.first_str(&["email"]),
            credentials.first_str(API_TOKEN),
        ) else {
            return ValidationOutcome::invalid(
                "jira credentials need base_url, email and api_token",
            );
        };
        let base = if base.starts_with("http://") || base.starts_with("https://") {
            base.to_string()
        } else {
            format!("https://{base}")
        };
        let request = self
            .client
            .get(join(&base, "/rest/api/3/myself"))
            .basic_auth(email, Some(api_token))
            .header("Accept", "application/json");
        self.check(IntegrationType::Jira, request).await
    }

    async fn n8n(&self, credentials: &Credentials) -> ValidationOutcome {
        let (Some(base), Some(api_key)) = (
            credentials.first_str(N8N_BASE),
            credentials.first_str(API_KEY),
        ) else {
            return ValidationOutcome::invalid("n8n credentials need base_url and api_key");
        };
        let request = self
            .client
            .get(join(base, "/api/v1/workflows"))
            .query(&[("limit", "1")])
            .header("X-N8N-API-KEY", api_key);
        self.check(IntegrationType::N8n, request).await
    }
}

#[async_trait]
impl ConnectionValidator for HttpConnectionValidator {
    async fn validate(
        &self,
        integration: IntegrationType,
        credentials: &Credentials,
    ) -> ValidationOutcome {
        debug!(%integration, "probing integration");
        match integration {
            IntegrationType::Slack => self.slack(credentials).await,
            IntegrationType::Github => self.github(credentials).await,
            IntegrationType::Notion => self.notion(credentials).await,
            IntegrationType::Google => self.google(credentials).await,
            IntegrationType::Jira => self.jira(credentials).await,
            IntegrationType::N8n => self.n8n(credentials).await,
            // No remote endpoint to check.
            IntegrationType::Custom if credentials.is_empty() => {
                ValidationOutcome::invalid("custom credentials are empty")
            },
            IntegrationType::Custom => ValidationOutcome::valid(),
        }
    }
}
