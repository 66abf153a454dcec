//! Shared test utilities for the pipeline crate.

use crate::process::{CommandExecutor, Invocation};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The program to execute (e.g., "git").
    pub program: String,
    /// The arguments to pass to the program.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: io::Result<Output>,
}

impl ExpectedCall {
    /// Expect `program` with `args`, answering with `result`.
    #[must_use]
    pub fn new(program: &str, args: &[&str], result: io::Result<Output>) -> Self {
        Self {
            program: program.to_owned(),
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
            result,
        }
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    #[expect(
        clippy::expect_used,
        reason = "stubs panic on unexpected invocations to fail the calling test"
    )]
    fn run(&self, invocation: &Invocation) -> io::Result<Output> {
        let mut expected = self.expected.borrow_mut();
        let call = expected
            .pop_front()
            .expect("unexpected command invocation");

        assert_eq!(call.program, invocation.program());
        assert_eq!(call.args.as_slice(), invocation.arguments());

        call.result
    }
}

/// Which external tool an invocation targets, recognised by argument shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Compiler: has a `library=` or `codename=` argument.
    Compiler,
    /// Signer: starts with `-jar`.
    Signer,
    /// Merge tool: starts with `-n`.
    Merge,
    /// Git: starts with `clone`, `add`, `commit`, or `push`.
    Git,
}

impl ToolKind {
    /// Classifies `invocation`, or `None` for an unrecognised command line.
    #[must_use]
    pub fn of(invocation: &Invocation) -> Option<Self> {
        let args = invocation.arguments();
        if args
            .iter()
            .any(|arg| arg.starts_with("library=") || arg.starts_with("codename="))
        {
            return Some(Self::Compiler);
        }
        match args.first().map(String::as_str) {
            Some("-jar") => Some(Self::Signer),
            Some("-n") => Some(Self::Merge),
            Some("clone" | "add" | "commit" | "push") => Some(Self::Git),
            _ => None,
        }
    }
}

/// An in-process stand-in for the whole vendor toolchain and git.
///
/// The compiler writes `<stem>.cod`, `<stem>.jar`, and `<stem>.jad`; the
/// merge tool writes its `-n` output; `git clone` creates the staging
/// directory. Every invocation is recorded, including its redacted display
/// form.
#[derive(Debug, Default)]
pub struct FakeToolchain {
    calls: RefCell<Vec<Invocation>>,
    failing: Option<(ToolKind, String)>,
    merge_silent: bool,
}

impl FakeToolchain {
    /// A toolchain where every tool succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `tool` exit with status 1 and `message` on stderr.
    #[must_use]
    pub fn failing(mut self, tool: ToolKind, message: &str) -> Self {
        self.failing = Some((tool, message.to_owned()));
        self
    }

    /// Make the merge tool succeed without writing its output.
    #[must_use]
    pub fn with_silent_merge(mut self) -> Self {
        self.merge_silent = true;
        self
    }

    /// All recorded invocations, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Recorded invocations of `tool`.
    #[must_use]
    pub fn calls_to(&self, tool: ToolKind) -> Vec<Invocation> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| ToolKind::of(call) == Some(tool))
            .cloned()
            .collect()
    }

    /// Module names passed to the compiler, in order.
    #[must_use]
    pub fn compiled_modules(&self) -> Vec<String> {
        self.calls_to(ToolKind::Compiler)
            .iter()
            .filter_map(|call| output_stem(call))
            .filter_map(|stem| {
                camino::Utf8Path::new(&stem)
                    .file_name()
                    .map(str::to_owned)
            })
            .collect()
    }

    fn emulate(&self, tool: ToolKind, invocation: &Invocation) -> io::Result<()> {
        let args = invocation.arguments();
        match tool {
            ToolKind::Compiler => {
                let stem = output_stem(invocation).ok_or_else(|| missing("output argument"))?;
                for ext in ["cod", "jar", "jad"] {
                    std::fs::write(format!("{stem}.{ext}"), format!("{stem} {ext}"))?;
                }
            }
            ToolKind::Merge if !self.merge_silent => {
                let target = args.get(1).ok_or_else(|| missing("merge target"))?;
                std::fs::write(target, "MIDlet-Version: merged\n")?;
            }
            ToolKind::Git if args.first().map(String::as_str) == Some("clone") => {
                let target = args.get(2).ok_or_else(|| missing("clone target"))?;
                std::fs::create_dir_all(target)?;
            }
            ToolKind::Merge | ToolKind::Signer | ToolKind::Git => {}
        }
        Ok(())
    }
}

impl CommandExecutor for FakeToolchain {
    fn run(&self, invocation: &Invocation) -> io::Result<Output> {
        self.calls.borrow_mut().push(invocation.clone());
        let tool = ToolKind::of(invocation)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, invocation.to_string()))?;

        if let Some((failing, message)) = &self.failing
            && *failing == tool
        {
            return Ok(failure_output(message));
        }
        self.emulate(tool, invocation)?;
        Ok(success_output())
    }
}

fn output_stem(invocation: &Invocation) -> Option<String> {
    invocation.arguments().iter().find_map(|arg| {
        arg.strip_prefix("library=")
            .or_else(|| arg.strip_prefix("codename="))
            .map(str::to_owned)
    })
}

fn missing(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("missing {what}"))
}
