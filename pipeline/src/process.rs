//! External command execution.
//!
//! Every vendor tool and `git` is reached through [`CommandExecutor`], so
//! stages can be exercised with stubs in tests. An [`Invocation`] records the
//! program, its arguments, the working directory, and an optional timeout.
//! Arguments added with [`Invocation::secret_arg`] are masked whenever the
//! invocation is displayed or logged.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, trace};
use std::fmt;
use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

const REDACTED: &str = "********";

/// One command line to execute.
///
/// # Examples
///
/// ```
/// use relpipe::process::Invocation;
///
/// let invocation = Invocation::new("java")
///     .args(["-jar", "SignatureTool.jar", "-a", "-p"])
///     .secret_arg("hunter2")
///     .arg("-r")
///     .arg("build/bb45");
///
/// assert_eq!(invocation.arguments()[4], "hunter2");
/// assert!(!invocation.to_string().contains("hunter2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    secret: Vec<bool>,
    working_dir: Option<Utf8PathBuf>,
    timeout: Option<Duration>,
}

impl Invocation {
    /// Start an invocation of `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            secret: Vec::new(),
            working_dir: None,
            timeout: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self.secret.push(false);
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        args.into_iter()
            .fold(self, |invocation, arg| invocation.arg(arg))
    }

    /// Append an argument that must never be displayed or logged.
    #[must_use]
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self.secret.push(true);
        self
    }

    /// Run the command from `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Kill the command if it runs longer than `timeout`.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The program to run.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The raw arguments, secrets included.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Working directory, if one was set.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Utf8Path> {
        self.working_dir.as_deref()
    }

    /// Timeout, if one was set.
    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for (arg, secret) in self.args.iter().zip(&self.secret) {
            let shown = if *secret { REDACTED } else { arg.as_str() };
            write!(f, " {shown}")?;
        }
        Ok(())
    }
}

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs `invocation` to completion and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O error encountered while spawning or waiting for the
    /// command, and [`io::ErrorKind::TimedOut`] when the invocation's
    /// timeout elapses.
    fn run(&self, invocation: &Invocation) -> io::Result<Output>;
}

/// Executes commands on the host system.
///
/// # Examples
///
/// ```no_run
/// use relpipe::process::{CommandExecutor, Invocation, SystemCommandExecutor};
///
/// let executor = SystemCommandExecutor;
/// let output = executor.run(&Invocation::new("git").arg("--version"))?;
/// assert!(output.status.success());
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, invocation: &Invocation) -> io::Result<Output> {
        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = invocation.working_dir() {
            cmd.current_dir(dir.as_std_path());
        }

        let mut child = cmd.spawn()?;
        // Drain both pipes while waiting so chatty tools cannot block on a
        // full pipe buffer.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match invocation.time_limit() {
            Some(limit) => match child.wait_timeout(limit)? {
                Some(status) => status,
                None => {
                    // Best effort: the process may already have exited.
                    if child.kill().is_err() {
                        trace!("{} exited before it could be killed", invocation.program());
                    }
                    child.wait()?;
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("timed out after {} seconds", limit.as_secs()),
                    ));
                }
            },
            None => child.wait()?,
        };

        Ok(Output {
            status,
            stdout: collect(stdout)?,
            stderr: collect(stderr)?,
        })
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        pipe.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

fn collect(handle: Option<thread::JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::other("output reader thread panicked"))?,
        None => Ok(Vec::new()),
    }
}

/// Runs `invocation` through `executor`, logging the redacted command line.
///
/// # Errors
///
/// Propagates the executor's I/O error.
pub fn execute(executor: &dyn CommandExecutor, invocation: &Invocation) -> io::Result<Output> {
    debug!("running {invocation}");
    let output = executor.run(invocation)?;
    trace!("{} exited with {}", invocation.program(), output.status);
    Ok(output)
}

/// Trimmed diagnostic text from a finished command: stderr, or stdout when
/// stderr is empty. The vendor tools report most errors on stdout.
#[must_use]
pub fn output_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_owned()
    } else {
        stderr.to_owned()
    }
}
