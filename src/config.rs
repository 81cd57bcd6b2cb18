use anyhow::{Context, Result};
use serde::Deserialize;
use std::{env, fs, path::Path};
use tracing::info;

pub const CONN_ENV: &str = "DB_CONNECTION_STRING";
pub const SECRETS_ENV: &str = "SECRETS_FILE";
pub const DEFAULT_SECRETS_FILE: &str = "secrets.yaml";

/// Runtime configuration. The only required value is the database connection
/// string: a DuckDB database path (`:memory:` allowed).
#[derive(Debug, Clone)]
pub struct Config {
    pub connection_string: String,
}

#[derive(Debug, Deserialize)]
struct SecretsFile {
    db_connection_string: Option<String>,
}

impl Config {
    /// Resolve the connection string from `DB_CONNECTION_STRING`, falling
    /// back to the YAML secrets file at `SECRETS_FILE` (default
    /// `secrets.yaml`). Missing in both places is a fatal startup error.
    pub fn load() -> Result<Self> {
        if let Ok(conn) = env::var(CONN_ENV) {
            if !conn.trim().is_empty() {
                info!("connection string from ${}", CONN_ENV);
                return Ok(Self {
                    connection_string: conn,
                });
            }
        }
        let secrets_path =
            env::var(SECRETS_ENV).unwrap_or_else(|_| DEFAULT_SECRETS_FILE.to_string());
        if Path::new(&secrets_path).is_file() {
            if let Some(config) = Self::from_secrets_file(Path::new(&secrets_path))? {
                info!(path = %secrets_path, "connection string from secrets file");
                return Ok(config);
            }
        }
        anyhow::bail!(
            "no {} found in the environment or in secrets file `{}`",
            CONN_ENV,
            secrets_path
        )
    }

    /// Read the secrets file; `Ok(None)` when it does not define a
    /// connection string.
    pub fn from_secrets_file(path: &Path) -> Result<Option<Self>> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading secrets file `{}`", path.display()))?;
        let secrets: SecretsFile = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing secrets file `{}`", path.display()))?;
        Ok(secrets
            .db_connection_string
            .filter(|s| !s.trim().is_empty())
            .map(|connection_string| Self { connection_string }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn secrets_file_provides_connection_string() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "db_connection_string: /tmp/labour.duckdb")?;
        let config = Config::from_secrets_file(tmp.path())?.expect("secret should be present");
        assert_eq!(config.connection_string, "/tmp/labour.duckdb");
        Ok(())
    }

    #[test]
    fn secrets_file_without_the_key_yields_none() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "other_key: value")?;
        assert!(Config::from_secrets_file(tmp.path())?.is_none());
        Ok(())
    }

    #[test]
    fn blank_connection_string_counts_as_missing() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "db_connection_string: \"  \"")?;
        assert!(Config::from_secrets_file(tmp.path())?.is_none());
        Ok(())
    }
}
