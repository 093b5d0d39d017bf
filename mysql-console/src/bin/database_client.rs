//! Interactive database shell for the configured connection
//!
//! Hands the terminal to the mysql client when stdin is a terminal, so line
//! editing, prompts and paging behave as if the user ran mysql directly.
//! Otherwise runs piped, which makes `database-client < statements.sql`
//! behave like the plain client.

use anyhow::Result;
use common::init_logging;
use mysql_console::config::ConnectionConfig;
use mysql_console::process::{ClientIo, Input, MysqlRunner};
use std::env;
use std::io::IsTerminal;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logging("database-client");

    let connection = ConnectionConfig::from_env()?;
    let args: Vec<String> = env::args().skip(1).collect();

    let interactive = std::io::stdin().is_terminal();
    debug!(database = %connection.dbname, interactive, "Starting client");

    let mut runner = MysqlRunner::new(connection);
    let io = if interactive {
        ClientIo::Interactive
    } else {
        ClientIo::Piped {
            input: Input::Inherit,
            sink: None,
        }
    };
    let result = runner.client(&args, io).await?;

    // exit() skips destructors; drop the runner first so the credentials
    // file is removed.
    drop(runner);
    std::process::exit(result.exit_code());
}
