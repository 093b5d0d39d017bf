//! Streams a SQL dump into the mysql client
//!
//! Usage: `database-import [dump.sql] [mysql args...]`
//! Without a file argument the dump is read from stdin.

use anyhow::{Context, Result};
use common::init_logging;
use mysql_console::config::ConnectionConfig;
use mysql_console::process::{ClientIo, Input, MysqlRunner};
use std::env;
use tokio::fs::File;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logging("database-import");

    let connection = ConnectionConfig::from_env()?;
    let mut args: Vec<String> = env::args().skip(1).collect();

    // First non-flag argument is the dump file; everything else passes
    // through to mysql.
    let input = match args.iter().position(|a| !a.starts_with('-')) {
        Some(idx) => {
            let path = args.remove(idx);
            info!(file = %path, database = %connection.dbname, "Importing dump");
            let file = File::open(&path)
                .await
                .with_context(|| format!("Failed to open dump file {}", path))?;
            Input::Reader(Box::new(file))
        }
        None => {
            info!(database = %connection.dbname, "Importing dump from stdin");
            Input::Inherit
        }
    };

    let mut runner = MysqlRunner::new(connection);
    let result = runner
        .client(&args, ClientIo::Piped { input, sink: None })
        .await?;

    // exit() skips destructors; drop the runner first so the credentials
    // file is removed.
    drop(runner);
    std::process::exit(result.exit_code());
}
