//! Environment variable parsing helpers
//!
//! Provides ergonomic helpers for reading configuration from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Extension trait for parsing environment variables.
///
/// Provides convenient methods for reading env vars as required or optional
/// values.
pub trait ConfigExt {
    /// Get a required environment variable, returning an error if not set.
    ///
    /// # Example
    /// ```ignore
    /// let dbname = String::env_required("DB_NAME")?;
    /// ```
    fn env_required(name: &str) -> Result<String> {
        env::var(name).context(format!("{} must be set", name))
    }

    /// Get an optional environment variable.
    ///
    /// Empty values count as unset, so `DB_HOST=""` behaves like no
    /// `DB_HOST` at all.
    fn env_opt(name: &str) -> Option<String> {
        env::var(name).ok().filter(|v| !v.is_empty())
    }
}

// Blanket implementation for all types
impl<T> ConfigExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_counts_as_unset() {
        env::set_var("CONFIG_EXT_TEST_EMPTY", "");
        assert_eq!(String::env_opt("CONFIG_EXT_TEST_EMPTY"), None);
        env::remove_var("CONFIG_EXT_TEST_EMPTY");
        assert_eq!(String::env_opt("CONFIG_EXT_TEST_EMPTY"), None);
    }

    #[test]
    fn required_reports_the_variable_name() {
        let err = String::env_required("CONFIG_EXT_TEST_MISSING").unwrap_err();
        assert!(err.to_string().contains("CONFIG_EXT_TEST_MISSING"));
    }
}
