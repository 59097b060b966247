//! Server configuration, resolved from environment variables (a `.env`
//! file is honored) with CLI overrides applied on top.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use footprint_core::PollPolicy;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8085";
pub const DEFAULT_ENUMERATOR_PROGRAM: &str = "sherlock";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub max_db_connections: u32,
    /// External enumeration command; receives the subject plus
    /// `--timeout`/`--site` arguments and prints a JSON result map.
    pub enumerator_program: String,
    pub enumerator_args: Vec<String>,
    /// Optional platform table override; the embedded table is used when
    /// unset.
    pub platform_table_path: Option<PathBuf>,
    pub poll_interval_secs: u64,
    pub poll_max_attempts: u32,
}

impl Config {
    pub fn from_env(database_url_override: Option<String>) -> Result<Self> {
        let bind_addr = env_or("FOOTPRINT_BIND_ADDR", DEFAULT_BIND_ADDR)
            .parse()
            .context("FOOTPRINT_BIND_ADDR is not a valid socket address")?;

        let database_url = match database_url_override {
            Some(url) => url,
            None => std::env::var("DATABASE_URL")
                .context("DATABASE_URL must be set (or pass --database-url)")?,
        };

        let max_db_connections = env_or("FOOTPRINT_MAX_DB_CONNECTIONS", "10")
            .parse()
            .context("FOOTPRINT_MAX_DB_CONNECTIONS is not a number")?;

        let enumerator_program =
            env_or("FOOTPRINT_ENUMERATOR", DEFAULT_ENUMERATOR_PROGRAM);
        let enumerator_args = std::env::var("FOOTPRINT_ENUMERATOR_ARGS")
            .map(|raw| raw.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();

        let platform_table_path = std::env::var("FOOTPRINT_PLATFORMS_FILE")
            .ok()
            .map(PathBuf::from);

        let poll_interval_secs = env_or("FOOTPRINT_POLL_INTERVAL_SECS", "5")
            .parse()
            .context("FOOTPRINT_POLL_INTERVAL_SECS is not a number")?;
        let poll_max_attempts = env_or("FOOTPRINT_POLL_MAX_ATTEMPTS", "60")
            .parse()
            .context("FOOTPRINT_POLL_MAX_ATTEMPTS is not a number")?;

        Ok(Self {
            bind_addr,
            database_url,
            max_db_connections,
            enumerator_program,
            enumerator_args,
            platform_table_path,
            poll_interval_secs,
            poll_max_attempts,
        })
    }

    /// Default tracking budget for HTTP track/resume requests.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.poll_interval_secs),
            self.poll_max_attempts,
        )
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
