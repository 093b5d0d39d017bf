//! mysql / mysqldump process construction and execution
//!
//! Assembles the argument list from connection settings, materializes the
//! credentials file on first use, and runs the tool either piped (output
//! dispatched chunk-wise to a sink) or interactive (full terminal handoff).

use crate::config::ConnectionConfig;
use crate::credentials::CredentialsFile;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, warn};

const MYSQL_BIN: &str = "mysql";
const MYSQLDUMP_BIN: &str = "mysqldump";

/// Which output pipe a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Caller-supplied destination for piped process output.
pub type OutputSink<'a> = &'a mut dyn FnMut(StreamKind, &[u8]);

/// What to feed the child's stdin in piped mode.
pub enum Input {
    /// The child reads the invoking process's stdin directly.
    Inherit,
    /// No input.
    Null,
    /// Stream this reader into the child's stdin.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

/// How a client invocation talks to the world.
pub enum ClientIo<'a> {
    /// Hand the child the invoking terminal's own streams. Line editing,
    /// prompts and paging work as if the user ran the tool directly.
    /// There is no output capture in this mode.
    Interactive,
    /// Standard pipes; output is dispatched chunk-wise to the sink.
    Piped {
        input: Input,
        sink: Option<OutputSink<'a>>,
    },
}

/// Exit state of a finished invocation.
///
/// A non-zero exit code is domain data, not an error: wrong passwords and
/// unreachable hosts are conditions the caller reports verbatim.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionResult {
    pub success: bool,
    /// None when the process was killed by a signal.
    pub code: Option<i32>,
}

impl ExecutionResult {
    fn from_status(status: std::process::ExitStatus) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
        }
    }

    /// Exit code for a wrapper binary to propagate.
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(1)
    }
}

/// Errors that abort an invocation before it produces an exit code.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn {binary}")]
    Spawn {
        binary: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write credentials file")]
    Credentials(#[source] std::io::Error),

    #[error("i/o error while running {binary}")]
    Io {
        binary: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Builds and runs mysql / mysqldump invocations for one connection.
///
/// The runner owns the transient credentials file backing its invocations.
/// The file is created the first time a command needs a user or password,
/// reused by later commands, and removed when the runner is dropped.
pub struct MysqlRunner {
    connection: ConnectionConfig,
    credentials: Option<CredentialsFile>,
}

impl MysqlRunner {
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            credentials: None,
        }
    }

    /// Run the mysql client against the configured database.
    ///
    /// `extra_args` must not carry credentials; those always come from the
    /// connection settings.
    pub async fn client(
        &mut self,
        extra_args: &[String],
        io: ClientIo<'_>,
    ) -> Result<ExecutionResult, CommandError> {
        let args = self.connection_args(extra_args)?;
        match io {
            ClientIo::Interactive => run_interactive(MYSQL_BIN, &args).await,
            ClientIo::Piped { input, sink } => run_piped(MYSQL_BIN, &args, input, sink).await,
        }
    }

    /// Run mysqldump against the configured database.
    pub async fn dump(
        &mut self,
        extra_args: &[String],
        sink: Option<OutputSink<'_>>,
    ) -> Result<ExecutionResult, CommandError> {
        let args = self.connection_args(extra_args)?;
        run_piped(MYSQLDUMP_BIN, &args, Input::Null, sink).await
    }

    /// Connection arguments followed by `extra_args`.
    fn connection_args(&mut self, extra_args: &[String]) -> Result<Vec<OsString>, CommandError> {
        self.materialize_credentials()?;

        let credentials = self.credentials.as_ref().map(|c| c.path());
        let mut args = build_args(&self.connection, credentials);
        args.extend(extra_args.iter().map(OsString::from));
        Ok(args)
    }

    /// Create the credentials file on first use.
    ///
    /// Skipped entirely when neither user nor password is set. An existing
    /// file is reused as-is; it is only recreated if it disappeared from
    /// disk underneath us.
    fn materialize_credentials(&mut self) -> Result<(), CommandError> {
        if !self.connection.needs_credentials() {
            return Ok(());
        }

        let stale = self
            .credentials
            .as_ref()
            .is_some_and(|c| !c.path().exists());
        if self.credentials.is_none() || stale {
            let file = CredentialsFile::create(
                self.connection.user.as_deref(),
                self.connection.password.as_deref(),
            )
            .map_err(CommandError::Credentials)?;
            self.credentials = Some(file);
        }
        Ok(())
    }
}

/// Connection part of the argument list.
///
/// Flags whose field is unset are omitted entirely; the client tools reject
/// empty-valued flags.
fn build_args(connection: &ConnectionConfig, credentials: Option<&Path>) -> Vec<OsString> {
    let mut args = Vec::new();

    if let Some(path) = credentials {
        let mut flag = OsString::from("--defaults-extra-file=");
        flag.push(path);
        args.push(flag);
    }
    if let Some(host) = &connection.host {
        args.push("-h".into());
        args.push(host.into());
    }
    if let Some(port) = connection.port {
        args.push("-P".into());
        args.push(port.to_string().into());
    }
    if let Some(socket) = &connection.socket {
        args.push("-S".into());
        args.push(socket.into());
    }
    args.push(connection.dbname.as_str().into());

    args
}

fn forward_sigterm(child: &Child) {
    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
}

/// Full terminal handoff: the child inherits our stdin/stdout/stderr.
///
/// SIGINT is left to the child (mysql aborts the current query on Ctrl-C
/// rather than exiting), so we keep waiting until the child actually exits.
async fn run_interactive(
    binary: &'static str,
    args: &[OsString],
) -> Result<ExecutionResult, CommandError> {
    debug!(binary, ?args, "Starting interactive session");

    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| CommandError::Spawn { binary, source })?;

    let mut sigint =
        signal(SignalKind::interrupt()).map_err(|source| CommandError::Io { binary, source })?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|source| CommandError::Io { binary, source })?;

    loop {
        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|source| CommandError::Io { binary, source })?;
                return Ok(ExecutionResult::from_status(status));
            }
            _ = sigint.recv() => {
                // The terminal delivers SIGINT to the whole foreground
                // process group; the client handles it itself.
            }
            _ = sigterm.recv() => {
                forward_sigterm(&child);
            }
        }
    }
}

/// Piped execution: stdout/stderr are read chunk-wise and dispatched to the
/// sink. Without a sink, stdout flows verbatim to our stdout and stderr is
/// surfaced on our stderr.
///
/// SIGTERM/SIGINT are forwarded to the child as SIGTERM; we then return
/// normally so the runner's teardown still happens.
async fn run_piped(
    binary: &'static str,
    args: &[OsString],
    input: Input,
    mut sink: Option<OutputSink<'_>>,
) -> Result<ExecutionResult, CommandError> {
    debug!(binary, ?args, "Running");

    let mut cmd = Command::new(binary);
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());

    match &input {
        Input::Inherit => {
            cmd.stdin(Stdio::inherit());
        }
        Input::Null => {
            cmd.stdin(Stdio::null());
        }
        Input::Reader(_) => {
            cmd.stdin(Stdio::piped());
        }
    }

    let mut child = cmd
        .spawn()
        .map_err(|source| CommandError::Spawn { binary, source })?;

    // Feed the reader into the child's stdin from its own task, so the
    // output loop below cannot deadlock against a full stdin pipe.
    let mut stdin_task = None;
    if let Input::Reader(mut reader) = input {
        if let Some(mut stdin) = child.stdin.take() {
            stdin_task = Some(tokio::spawn(async move {
                let result = tokio::io::copy(&mut reader, &mut stdin).await;
                // Close the pipe so the child sees EOF
                drop(stdin);
                result
            }));
        }
    }

    let mut sigint =
        signal(SignalKind::interrupt()).map_err(|source| CommandError::Io { binary, source })?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|source| CommandError::Io { binary, source })?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut stdout_done = stdout.is_none();
    let mut stderr_done = stderr.is_none();
    let mut out_buf = vec![0u8; 8192];
    let mut err_buf = vec![0u8; 8192];

    while !(stdout_done && stderr_done) {
        tokio::select! {
            read = read_chunk(stdout.as_mut(), &mut out_buf), if !stdout_done => {
                let n = read.map_err(|source| CommandError::Io { binary, source })?;
                if n == 0 {
                    stdout_done = true;
                } else {
                    dispatch(&mut sink, StreamKind::Stdout, &out_buf[..n])
                        .map_err(|source| CommandError::Io { binary, source })?;
                }
            }
            read = read_chunk(stderr.as_mut(), &mut err_buf), if !stderr_done => {
                let n = read.map_err(|source| CommandError::Io { binary, source })?;
                if n == 0 {
                    stderr_done = true;
                } else {
                    dispatch(&mut sink, StreamKind::Stderr, &err_buf[..n])
                        .map_err(|source| CommandError::Io { binary, source })?;
                }
            }
            _ = sigterm.recv() => {
                warn!(binary, "Received SIGTERM, forwarding to child");
                forward_sigterm(&child);
            }
            _ = sigint.recv() => {
                warn!(binary, "Received SIGINT, forwarding to child");
                forward_sigterm(&child);
            }
        }
    }

    if let Some(task) = stdin_task {
        match task.await {
            Ok(Ok(_)) => {}
            // The child exited before consuming all input; its exit status
            // tells the story.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(source)) => return Err(CommandError::Io { binary, source }),
            Err(_) => {}
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|source| CommandError::Io { binary, source })?;
    Ok(ExecutionResult::from_status(status))
}

async fn read_chunk<R: AsyncRead + Unpin>(
    stream: Option<&mut R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match stream {
        Some(stream) => stream.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Default policy when no sink is given: stdout flows through verbatim,
/// stderr is surfaced on our stderr instead of being swallowed.
fn dispatch(
    sink: &mut Option<OutputSink<'_>>,
    kind: StreamKind,
    chunk: &[u8],
) -> std::io::Result<()> {
    match sink {
        Some(sink) => {
            sink(kind, chunk);
            Ok(())
        }
        None => match kind {
            StreamKind::Stdout => {
                let mut out = std::io::stdout();
                out.write_all(chunk)?;
                out.flush()
            }
            StreamKind::Stderr => {
                let mut err = std::io::stderr();
                err.write_all(chunk)?;
                err.flush()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn shop_config() -> ConnectionConfig {
        ConnectionConfig {
            dbname: "shop".to_string(),
            ..Default::default()
        }
    }

    fn as_strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn dbname_only_yields_a_single_positional_argument() {
        let args = build_args(&shop_config(), None);
        assert_eq!(as_strings(&args), vec!["shop"]);
    }

    #[test]
    fn unset_fields_produce_no_flags() {
        let config = ConnectionConfig {
            host: Some("db.local".to_string()),
            dbname: "shop".to_string(),
            ..Default::default()
        };
        let args = build_args(&config, None);
        assert_eq!(as_strings(&args), vec!["-h", "db.local", "shop"]);
    }

    #[test]
    fn full_connection_matches_the_documented_order() {
        let config = ConnectionConfig {
            host: Some("db.local".to_string()),
            port: Some(3306),
            socket: None,
            dbname: "shop".to_string(),
            user: Some("root".to_string()),
            password: Some("secret".to_string()),
        };
        let args = build_args(&config, Some(Path::new("/tmp/creds.cnf")));
        assert_eq!(
            as_strings(&args),
            vec![
                "--defaults-extra-file=/tmp/creds.cnf",
                "-h",
                "db.local",
                "-P",
                "3306",
                "shop",
            ]
        );
    }

    #[test]
    fn extra_args_follow_the_connection_arguments() {
        let mut runner = MysqlRunner::new(shop_config());
        let args = runner
            .connection_args(&["--no-data".to_string()])
            .unwrap();
        assert_eq!(as_strings(&args), vec!["shop", "--no-data"]);
    }

    #[test]
    fn credentials_file_is_reused_and_not_rewritten() {
        let mut runner = MysqlRunner::new(ConnectionConfig {
            dbname: "shop".to_string(),
            user: Some("root".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        });

        runner.materialize_credentials().unwrap();
        let first: PathBuf = runner.credentials.as_ref().unwrap().path().to_path_buf();

        // Scribble on the file; a rewrite would wipe this marker.
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&first)
            .unwrap();
        std::io::Write::write_all(&mut file, b"# marker\n").unwrap();

        runner.materialize_credentials().unwrap();
        let second = runner.credentials.as_ref().unwrap().path().to_path_buf();
        assert_eq!(first, second);

        let content = std::fs::read_to_string(&second).unwrap();
        assert!(content.contains("# marker"));

        drop(runner);
        assert!(!first.exists());
    }

    #[test]
    fn no_credentials_means_no_file() {
        let mut runner = MysqlRunner::new(shop_config());
        runner.materialize_credentials().unwrap();
        assert!(runner.credentials.is_none());
    }

    #[tokio::test]
    async fn piped_output_reaches_the_sink_tagged_by_stream() {
        let args = [
            OsString::from("-c"),
            OsString::from("printf out; printf err >&2"),
        ];
        let mut out: Vec<u8> = Vec::new();
        let mut err: Vec<u8> = Vec::new();
        let mut sink = |kind: StreamKind, chunk: &[u8]| match kind {
            StreamKind::Stdout => out.extend_from_slice(chunk),
            StreamKind::Stderr => err.extend_from_slice(chunk),
        };

        let result = run_piped("sh", &args, Input::Null, Some(&mut sink))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(out, b"out");
        assert_eq!(err, b"err");
    }

    #[tokio::test]
    async fn nonzero_exit_is_data_not_an_error() {
        let args = [OsString::from("-c"), OsString::from("exit 3")];
        let result = run_piped("sh", &args, Input::Null, None).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.code, Some(3));
        assert_eq!(result.exit_code(), 3);
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let err = run_piped("mysql-console-no-such-binary", &[], Input::Null, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[tokio::test]
    async fn reader_input_is_streamed_into_the_child() {
        let args = [OsString::from("-c"), OsString::from("cat")];
        let mut stdout: Vec<u8> = Vec::new();
        let mut sink = |kind: StreamKind, chunk: &[u8]| {
            if kind == StreamKind::Stdout {
                stdout.extend_from_slice(chunk);
            }
        };

        let input = Input::Reader(Box::new(&b"SELECT 1;\n"[..]));
        let result = run_piped("sh", &args, input, Some(&mut sink)).await.unwrap();

        assert!(result.success);
        assert_eq!(stdout, b"SELECT 1;\n");
    }
}
