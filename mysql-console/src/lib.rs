//! Safe command construction for the mysql client tools
//!
//! Builds `mysql` / `mysqldump` invocations from connection settings while
//! keeping secrets out of the argument list: credentials travel via a
//! transient `--defaults-extra-file` that is owned by the runner and
//! removed when the runner goes away.

pub mod config;
pub mod credentials;
pub mod process;

pub use config::ConnectionConfig;
pub use credentials::CredentialsFile;
pub use process::{
    ClientIo, CommandError, ExecutionResult, Input, MysqlRunner, OutputSink, StreamKind,
};
