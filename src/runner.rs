//! Subprocess Runner Module
//!
//! Every external tool (package manager, git) is driven through the
//! `CommandRunner` trait so build steps can be exercised without spawning
//! real processes. The working directory travels with each invocation; the
//! process-wide current directory is never touched.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A single subprocess call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I, cwd: &Path) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.to_path_buf(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Exit code and (for captured runs) stdout of a finished child
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// `None` when the child was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Blocking, non-raising subprocess execution.
///
/// A non-zero exit is reported through `RunOutcome::code`, never as `Err`;
/// `Err` is reserved for failures to start the child at all.
pub trait CommandRunner {
    /// Run with inherited stdio and wait for exit
    fn status(&self, invocation: &Invocation) -> io::Result<RunOutcome>;

    /// Run with stdout captured and stderr inherited, and wait for exit
    fn capture(&self, invocation: &Invocation) -> io::Result<RunOutcome>;
}

/// `CommandRunner` backed by `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null());
        cmd
    }
}

impl CommandRunner for SystemRunner {
    fn status(&self, invocation: &Invocation) -> io::Result<RunOutcome> {
        tracing::debug!("Running `{}` in {}", invocation, invocation.cwd.display());
        let status = Self::command(invocation)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;

        Ok(RunOutcome {
            code: status.code(),
            stdout: String::new(),
        })
    }

    fn capture(&self, invocation: &Invocation) -> io::Result<RunOutcome> {
        tracing::debug!("Capturing `{}` in {}", invocation, invocation.cwd.display());
        let output = Self::command(invocation)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()?;

        Ok(RunOutcome {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted runner used by the web and version tests

    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Records every invocation and replays queued results in order.
    /// Once the queue is empty every call succeeds with empty output.
    #[derive(Default)]
    pub struct RecordingRunner {
        pub calls: RefCell<Vec<Invocation>>,
        results: RefCell<VecDeque<io::Result<RunOutcome>>>,
    }

    impl RecordingRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_exit(&self, code: i32, stdout: &str) {
            self.results.borrow_mut().push_back(Ok(RunOutcome {
                code: Some(code),
                stdout: stdout.to_string(),
            }));
        }

        pub fn push_signal(&self) {
            self.results
                .borrow_mut()
                .push_back(Ok(RunOutcome { code: None, stdout: String::new() }));
        }

        pub fn push_err(&self, kind: io::ErrorKind) {
            self.results
                .borrow_mut()
                .push_back(Err(io::Error::new(kind, "scripted failure")));
        }

        pub fn programs(&self) -> Vec<String> {
            self.calls.borrow().iter().map(|c| c.to_string()).collect()
        }

        fn next(&self, invocation: &Invocation) -> io::Result<RunOutcome> {
            self.calls.borrow_mut().push(invocation.clone());
            self.results.borrow_mut().pop_front().unwrap_or_else(|| {
                Ok(RunOutcome {
                    code: Some(0),
                    stdout: String::new(),
                })
            })
        }
    }

    impl CommandRunner for RecordingRunner {
        fn status(&self, invocation: &Invocation) -> io::Result<RunOutcome> {
            self.next(invocation)
        }

        fn capture(&self, invocation: &Invocation) -> io::Result<RunOutcome> {
            self.next(invocation)
        }
    }
}
