use anyhow::{anyhow, ensure, Context, Result};
use axum_extra::extract::cookie::Key;

/// Process configuration, read once at startup from the environment and
/// immutable afterwards.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub identity: IdentityConfig,
    pub tables: TableConfig,
    pub session_key: Key,
    pub github: Option<GithubConfig>,
    pub slack_token: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("identity", &self.identity)
            .field("tables", &self.tables)
            .field("session_key", &"<redacted>")
            .field("github", &self.github)
            .field("slack_token", &self.slack_token)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub client_id: String,
    pub client_secret: String,
    pub pool_id: String,
}

#[derive(Debug, Clone)]
pub struct TableConfig {
    pub posts: String,
    pub likes: String,
    /// Points the store at a local instance during development.
    pub endpoint: Option<String>,
}

/// OAuth app used by the signup-assist flow. Only active when all three
/// values are configured.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |name: &str| get(name).filter(|value| !value.is_empty());
        let required = |name: &str| optional(name).ok_or_else(|| anyhow!("{name} must be set"));

        let host = optional("HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port = match optional("PORT") {
            Some(raw) => raw.parse().context("PORT must be a port number")?,
            None => 3000,
        };

        let identity = IdentityConfig {
            client_id: required("COGNITO_CLIENT_ID")?,
            client_secret: required("COGNITO_CLIENT_SECRET")?,
            pool_id: required("COGNITO_POOL_ID")?,
        };

        let tables = TableConfig {
            posts: required("DYNAMO_TABLE_POSTS")?,
            likes: required("DYNAMO_TABLE_LIKES")?,
            endpoint: optional("DYNAMO_ENDPOINT"),
        };

        let raw_key = required("SESSION_KEY")?;
        ensure!(raw_key.len() >= 32, "SESSION_KEY must be at least 32 bytes");
        let session_key = Key::derive_from(raw_key.as_bytes());

        let github = match (
            optional("GITHUB_CLIENT_ID"),
            optional("GITHUB_CLIENT_SECRET"),
            optional("GITHUB_CALLBACK"),
        ) {
            (Some(client_id), Some(client_secret), Some(callback)) => Some(GithubConfig {
                client_id,
                client_secret,
                callback,
            }),
            _ => None,
        };

        Ok(Self {
            host,
            port,
            identity,
            tables,
            session_key,
            github,
            slack_token: optional("SLACK_TOKEN"),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
