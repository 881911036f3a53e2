//! Server settings. Every flag falls back to an environment variable, and
//! `main` loads `.env` first.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use metagov_client::config::DEFAULT_SERVER_URL;
use metagov_client::BackendConfig;
use metagov_core::bulk::DEFAULT_BULK_CONCURRENCY;

#[derive(Debug, Clone, Parser)]
#[command(name = "metagov-server", about = "Metadata governance sync server")]
pub struct ServerConfig {
    #[arg(long, env = "METAGOV_BIND_ADDR", default_value = "0.0.0.0:4200")]
    pub bind_addr: String,

    /// Postgres connection string. Without it rows live in memory.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Root directory for staged change files.
    #[arg(long, env = "METAGOV_STAGING_DIR", default_value = "metadata-manager")]
    pub staging_dir: PathBuf,

    #[arg(long, env = "METAGOV_BULK_CONCURRENCY", default_value_t = DEFAULT_BULK_CONCURRENCY)]
    pub bulk_concurrency: usize,

    #[arg(long, env = "METAGOV_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    #[arg(long, env = "DATAHUB_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub datahub_url: String,

    #[arg(long, env = "DATAHUB_TOKEN", hide_env_values = true)]
    pub datahub_token: Option<String>,

    #[arg(
        long,
        env = "DATAHUB_VERIFY_SSL",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub verify_ssl: bool,
}

impl ServerConfig {
    pub fn backend_config(&self) -> anyhow::Result<BackendConfig> {
        let mut config = BackendConfig::new(&self.datahub_url)?
            .with_timeout(Duration::from_secs(self.http_timeout_secs));
        config.token = self
            .datahub_token
            .clone()
            .filter(|t| !t.trim().is_empty());
        config.verify_ssl = self.verify_ssl;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "metagov-server",
            "--bind-addr",
            "127.0.0.1:9000",
            "--bulk-concurrency",
            "8",
            "--datahub-url",
            "https://gms.internal",
            "--datahub-token",
            "tok",
            "--verify-ssl",
            "no",
            "--http-timeout-secs",
            "5",
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.bulk_concurrency, 8);
        assert!(!config.verify_ssl);

        let backend = config.backend_config().unwrap();
        assert_eq!(backend.token.as_deref(), Some("tok"));
        assert_eq!(backend.timeout, Duration::from_secs(5));
        assert!(!backend.verify_ssl);
    }

    #[test]
    fn verify_ssl_defaults_on_and_takes_a_value() {
        let config = ServerConfig::try_parse_from(["metagov-server"]).unwrap();
        assert!(config.verify_ssl);

        let config =
            ServerConfig::try_parse_from(["metagov-server", "--verify-ssl", "false"]).unwrap();
        assert!(!config.verify_ssl);
        assert!(!config.backend_config().unwrap().verify_ssl);
    }

    #[test]
    fn bad_backend_url_is_an_error() {
        let config = ServerConfig::try_parse_from([
            "metagov-server",
            "--datahub-url",
            "::nope::",
        ])
        .unwrap();
        assert!(config.backend_config().is_err());
    }
}
