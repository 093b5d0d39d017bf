//! Shared utilities for mysql-console binaries
//!
//! This crate provides common functionality used across all mysql-console
//! binaries:
//! - Structured logging initialization
//! - Environment variable parsing helpers

pub mod config;
pub mod logging;

pub use config::ConfigExt;
pub use logging::init_logging;
