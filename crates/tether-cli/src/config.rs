//! CLI configuration from environment variables.

use anyhow::{bail, Context, Result};

use tether_core::DEFAULT_BATCH_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Rows per Arrow record batch when answering queries.
    pub batch_size: usize,
    /// Open SQLite databases without write access.
    pub read_only: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            read_only: false,
        }
    }
}

impl CliConfig {
    pub fn from_env() -> Result<Self> {
        let batch_size: usize = std::env::var("TETHER_BATCH_SIZE")
            .unwrap_or_else(|_| DEFAULT_BATCH_SIZE.to_string())
            .parse()
            .context("Invalid TETHER_BATCH_SIZE")?;
        if batch_size == 0 {
            bail!("Invalid TETHER_BATCH_SIZE: must be at least 1");
        }

        let read_only = match std::env::var("TETHER_READ_ONLY") {
            Ok(value) => parse_flag(&value).context("Invalid TETHER_READ_ONLY")?,
            Err(_) => false,
        };

        Ok(Self {
            batch_size,
            read_only,
        })
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_overrides(mut self, batch_size: Option<usize>, read_only: bool) -> Self {
        if let Some(size) = batch_size {
            self.batch_size = size.max(1);
        }
        self.read_only |= read_only;
        self
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("expected a boolean, got '{}'", other),
    }
}
