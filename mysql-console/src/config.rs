//! Database connection settings
//!
//! Read from `DB_*` environment variables, optionally seeded from a YAML
//! connection file (`DB_CONFIG_FILE`). Per-field environment variables win
//! over the file.

use anyhow::{Context, Result};
use common::ConfigExt;
use serde::Deserialize;
use std::path::Path;

/// Connection parameters for the mysql client tools.
///
/// Only the database name is required. Every other field may be left unset,
/// in which case the matching command-line flag is omitted entirely.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub socket: Option<String>,
    pub dbname: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Partial connection file - only fields we recognize, all optional
#[derive(Deserialize, Default)]
struct ConnectionFile {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    socket: Option<String>,
    #[serde(default)]
    dbname: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl ConnectionConfig {
    /// Load connection settings from the environment.
    ///
    /// If `DB_CONFIG_FILE` is set, that YAML file supplies defaults and the
    /// `DB_*` variables override it per field. `DB_NAME` (or `dbname` in
    /// the file) is required.
    pub fn from_env() -> Result<Self> {
        let file = match String::env_opt("DB_CONFIG_FILE") {
            Some(path) => load_connection_file(Path::new(&path))?,
            None => ConnectionFile::default(),
        };

        let dbname = String::env_opt("DB_NAME")
            .or_else(|| non_empty(file.dbname))
            .context("DB_NAME must be set (or dbname given in DB_CONFIG_FILE)")?;

        let port = match String::env_opt("DB_PORT") {
            Some(value) => Some(
                value
                    .parse()
                    .with_context(|| format!("DB_PORT is not a valid port number: {}", value))?,
            ),
            None => file.port,
        };

        Ok(Self {
            host: String::env_opt("DB_HOST").or_else(|| non_empty(file.host)),
            port,
            socket: String::env_opt("DB_SOCKET").or_else(|| non_empty(file.socket)),
            dbname,
            user: String::env_opt("DB_USER").or_else(|| non_empty(file.user)),
            password: String::env_opt("DB_PASSWORD").or_else(|| non_empty(file.password)),
        })
    }

    /// True when the connection needs a credentials file behind it.
    pub fn needs_credentials(&self) -> bool {
        self.user.is_some() || self.password.is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn load_connection_file(path: &Path) -> Result<ConnectionFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read connection file {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse connection file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn connection_file_allows_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connection.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "dbname: shop").unwrap();
        writeln!(file, "host: db.local").unwrap();
        writeln!(file, "socket: \"\"").unwrap();

        let parsed = load_connection_file(&path).unwrap();
        assert_eq!(parsed.dbname.as_deref(), Some("shop"));
        assert_eq!(parsed.host.as_deref(), Some("db.local"));
        assert_eq!(non_empty(parsed.socket), None);
        assert_eq!(parsed.port, None);
        assert_eq!(parsed.user, None);
    }

    #[test]
    fn connection_file_ignores_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connection.yml");
        std::fs::write(&path, "dbname: shop\ncharset: utf8mb4\n").unwrap();

        let parsed = load_connection_file(&path).unwrap();
        assert_eq!(parsed.dbname.as_deref(), Some("shop"));
    }

    #[test]
    fn missing_connection_file_is_an_error() {
        assert!(load_connection_file(Path::new("/nonexistent/connection.yml")).is_err());
    }
}
