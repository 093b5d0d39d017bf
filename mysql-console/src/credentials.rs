//! Transient credentials file
//!
//! The mysql tools read user/password from a configuration file instead of
//! argv, so secrets never show up in process listings. The file lives in
//! the system temp directory, is readable only by the owner, and is removed
//! when its owner is dropped.

use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Ephemeral `--defaults-extra-file` for the mysql client tools.
///
/// Holds `user`/`password` under both the `[mysqldump]` and `[client]`
/// sections so a single file serves both tools. Each instance gets a
/// uniquely named file, so concurrent owners in one process cannot race.
pub struct CredentialsFile {
    path: PathBuf,
}

impl CredentialsFile {
    /// Write a fresh credentials file into the system temp directory.
    pub fn create(user: Option<&str>, password: Option<&str>) -> std::io::Result<Self> {
        Self::create_in(&std::env::temp_dir(), user, password)
    }

    /// Write a fresh credentials file into `dir`.
    pub fn create_in(
        dir: &Path,
        user: Option<&str>,
        password: Option<&str>,
    ) -> std::io::Result<Self> {
        let path = dir.join(format!("mysql-console-{}.cnf", Uuid::new_v4()));

        let mut section = String::new();
        if let Some(user) = user {
            section.push_str(&format!("user=\"{}\"\n", user));
        }
        if let Some(password) = password {
            section.push_str(&format!("password=\"{}\"\n", password));
        }

        let content = format!("[mysqldump]\n{section}\n[client]\n{section}");

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path)?;
        file.write_all(content.as_bytes())?;

        debug!(path = %path.display(), "Wrote credentials file");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CredentialsFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove credentials file"
                );
            }
        }
    }
}
