//! Run external programs and report their failures as [`ToolError`].

use crate::error::ToolError;
use crate::utils::runlog::RunLog;
use itertools::Itertools;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Captured text output of a finished program.
#[derive(Clone, Debug, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// An external program invocation.
///
/// ```rust
/// use arts::utils::{runlog::RunLog, tool::Tool};
/// let log = RunLog::new("arts");
/// let output = Tool::new("echo").arg("hello").run(&log)?;
/// assert_eq!(output.stdout.trim(), "hello");
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
#[derive(Clone, Debug)]
pub struct Tool {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
}

impl Tool {
    pub fn new(program: &str) -> Self {
        Tool { program: program.to_string(), args: Vec::new(), current_dir: None, stdout: None, stderr: None }
    }

    pub fn arg<S: ToString>(mut self, arg: S) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.args.extend(args.into_iter().map(|a| a.to_string()));
        self
    }

    /// Add a path argument.
    pub fn path_arg(self, path: &Path) -> Self {
        let arg = path.display().to_string();
        self.arg(arg)
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Redirect standard output to a file.
    pub fn stdout(mut self, path: &Path) -> Self {
        self.stdout = Some(path.to_path_buf());
        self
    }

    /// Redirect standard error to a file.
    pub fn stderr(mut self, path: &Path) -> Self {
        self.stderr = Some(path.to_path_buf());
        self
    }

    /// Redirect standard output and standard error to the same file.
    pub fn log_to(self, path: &Path) -> Self {
        self.stdout(path).stderr(path)
    }

    /// The command line, for logs and errors.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program).chain(&self.args).join(" ")
    }

    fn command(&self, capture: bool) -> Result<Command, ToolError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        let redirect = |path: &Option<PathBuf>| -> Result<Stdio, ToolError> {
            match path {
                Some(path) => File::create(path).map(Stdio::from).map_err(|source| self.io_error(source)),
                None if capture => Ok(Stdio::piped()),
                None => Ok(Stdio::null()),
            }
        };
        match (&self.stdout, &self.stderr) {
            // both streams into one log file
            (Some(out), Some(err)) if out == err => {
                let file = File::create(out).map_err(|source| self.io_error(source))?;
                let copy = file.try_clone().map_err(|source| self.io_error(source))?;
                command.stdout(Stdio::from(file));
                command.stderr(Stdio::from(copy));
            }
            _ => {
                command.stdout(redirect(&self.stdout)?);
                command.stderr(redirect(&self.stderr)?);
            }
        }
        Ok(command)
    }

    fn io_error(&self, source: std::io::Error) -> ToolError {
        match source.kind() {
            ErrorKind::NotFound => ToolError::NotFound { program: self.program.clone() },
            _ => ToolError::Io { command: self.command_line(), source },
        }
    }

    fn check_status(&self, status: ExitStatus, stderr: &str) -> Result<(), ToolError> {
        match status.success() {
            true => Ok(()),
            false => {
                // fall back to the redirected stderr for the error message
                let stderr = match (stderr.is_empty(), &self.stderr) {
                    (true, Some(path)) => std::fs::read_to_string(path).unwrap_or_default(),
                    _ => stderr.to_string(),
                };
                let tail = stderr.lines().rev().take(20).collect_vec().into_iter().rev().join("\n");
                Err(ToolError::Failed { command: self.command_line(), status: status.to_string(), stderr: tail })
            }
        }
    }

    /// Run to completion, capturing any output that was not redirected to a file.
    pub fn run(&self, log: &RunLog) -> Result<ToolOutput, ToolError> {
        log.debug(format!("Running: {}", self.command_line()));
        let output = self.command(true)?.output().map_err(|e| self.io_error(e))?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        self.check_status(output.status, &stderr)?;
        Ok(ToolOutput { stdout, stderr })
    }

    /// Run with a hard wall-clock limit, killing the process once `timeout` elapses.
    ///
    /// Output that is not redirected to a file is discarded.
    pub fn run_with_timeout(&self, timeout: Duration, log: &RunLog) -> Result<(), ToolError> {
        log.debug(format!("Running with {} s limit: {}", timeout.as_secs(), self.command_line()));
        let mut child = self.command(false)?.spawn().map_err(|e| self.io_error(e))?;
        let start = Instant::now();
        let poll = Duration::from_millis(200).min(timeout);

        loop {
            match child.try_wait().map_err(|e| self.io_error(e))? {
                Some(status) => return self.check_status(status, ""),
                None if start.elapsed() >= timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ToolError::TimedOut { command: self.command_line(), seconds: timeout.as_secs() });
                }
                None => std::thread::sleep(poll),
            }
        }
    }
}

/// Returns `true` if a program can be found, either as a path or on the `PATH`.
///
/// ```rust
/// use arts::utils::tool::is_available;
/// assert!(is_available("sh"));
/// assert!(!is_available("definitely-not-a-real-program-name"));
/// ```
pub fn is_available(program: &str) -> bool {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}
