//! mysqldump wrapper for the configured connection
//!
//! Extra arguments pass through to mysqldump unchanged. The dump flows to
//! stdout while logs stay on stderr, so `database-export > dump.sql`
//! yields a clean dump.

use anyhow::Result;
use common::init_logging;
use mysql_console::config::ConnectionConfig;
use mysql_console::process::MysqlRunner;
use std::env;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logging("database-export");

    let connection = ConnectionConfig::from_env()?;
    let args: Vec<String> = env::args().skip(1).collect();

    info!(database = %connection.dbname, "Exporting database");

    let mut runner = MysqlRunner::new(connection);
    let result = runner.dump(&args, None).await?;

    if !result.success {
        warn!(code = ?result.code, "mysqldump exited with failure");
    }

    // exit() skips destructors; drop the runner first so the credentials
    // file is removed.
    drop(runner);
    std::process::exit(result.exit_code());
}
