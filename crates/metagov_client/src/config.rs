//! Backend connection settings.

use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub server_url: Url,
    pub token: Option<String>,
    pub verify_ssl: bool,
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(server_url: &str) -> Result<Self> {
        let server_url = Url::parse(server_url.trim())
            .with_context(|| format!("invalid backend url {server_url:?}"))?;
        Ok(Self {
            server_url,
            token: None,
            verify_ssl: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Read `DATAHUB_SERVER_URL`, `DATAHUB_TOKEN` and `DATAHUB_VERIFY_SSL`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("DATAHUB_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.into());
        let mut config = Self::new(&url)?;
        config.token = std::env::var("DATAHUB_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        if let Ok(v) = std::env::var("DATAHUB_VERIFY_SSL") {
            config.verify_ssl = parse_flag(&v).unwrap_or(true);
        }
        Ok(config)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<server>/api/graphql`, keeping any path prefix on the server url.
    pub fn graphql_endpoint(&self) -> Result<Url> {
        let mut base = self.server_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join("api/graphql")
            .context("failed to build graphql endpoint")
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
