//! Process runner that invokes external commands (git, build tools).
use std::{
    fmt,
    io::{self, Read},
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    thread::{self, sleep, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, the way build tools are read.
    pub fn combined(&self) -> Vec<String> {
        [self.stdout.clone(), self.stderr.clone()].concat()
    }
}

pub trait ProcessRunner {
    /// Run `command` in `working_dir` to completion, capturing its output.
    fn run(&self, command: &CommandLine, working_dir: &Path) -> Result<ProcessOutput>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, command: &CommandLine, working_dir: &Path) -> Result<ProcessOutput> {
        (**self).run(command, working_dir)
    }
}

/// Runs commands with `std::process`, optionally killing them after a deadline.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    timeout: Option<Duration>,
    poll_interval: Duration,
}

impl Default for ShellRunner {
    fn default() -> Self {
        ShellRunner {
            timeout: None,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl ShellRunner {
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        ShellRunner {
            timeout,
            ..ShellRunner::default()
        }
    }

    fn wait_with_deadline(
        &self,
        child: &mut Child,
        timeout: Duration,
        command: &CommandLine,
    ) -> Result<ExitStatus> {
        let start = Instant::now();

        loop {
            let status = child
                .try_wait()
                .map_err(|e| Error::process(command.to_string(), e))?;
            if let Some(status) = status {
                return Ok(status);
            }

            if start.elapsed() >= timeout {
                warn!(command = %command, ?timeout, "Killing command after timeout");
                if let Err(err) = child.kill() {
                    warn!(command = %command, error = %err, "Failed to kill timed out command");
                }
                if let Err(err) = child.wait() {
                    warn!(command = %command, error = %err, "Failed to reap killed command");
                }
                return Err(Error::Timeout {
                    command: command.to_string(),
                    timeout,
                });
            }

            sleep(self.poll_interval);
        }
    }
}

impl ProcessRunner for ShellRunner {
    fn run(&self, command: &CommandLine, working_dir: &Path) -> Result<ProcessOutput> {
        debug!(command = %command, dir = %working_dir.display(), "Running command");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::process(command.to_string(), e))?;

        // Drain both pipes concurrently so a chatty tool can't fill one and block.
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = match self.timeout {
            Some(timeout) => self.wait_with_deadline(&mut child, timeout, command)?,
            None => child
                .wait()
                .map_err(|e| Error::process(command.to_string(), e))?,
        };

        let stdout = join_reader(stdout).map_err(|e| Error::process(command.to_string(), e))?;
        let stderr = join_reader(stderr).map_err(|e| Error::process(command.to_string(), e))?;

        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

fn spawn_reader<T: Read + Send + 'static>(pipe: Option<T>) -> JoinHandle<io::Result<Vec<String>>> {
    thread::spawn(move || {
        let mut bytes = vec![];
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut bytes)?;
        }
        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(String::from)
            .collect())
    })
}

fn join_reader(handle: JoinHandle<io::Result<Vec<String>>>) -> io::Result<Vec<String>> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "output reader panicked")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_displays_like_a_shell_command() {
        let command = CommandLine::new("git", ["log", "--format=%h %p", "abc123"]);
        assert_eq!(command.to_string(), "git log --format=%h %p abc123");
    }

    #[test]
    fn combined_output_puts_stdout_first() {
        let output = ProcessOutput {
            exit_code: Some(1),
            stdout: vec!["out".to_string()],
            stderr: vec!["err".to_string()],
        };
        assert_eq!(output.combined(), vec!["out", "err"]);
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_captures_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let output = ShellRunner::default()
            .run(
                &CommandLine::new("sh", ["-c", "echo hello; echo oops 1>&2; exit 3"]),
                dir.path(),
            )
            .unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, vec!["hello"]);
        assert_eq!(output.stderr, vec!["oops"]);
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_kills_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let result = ShellRunner::with_timeout(Some(Duration::from_millis(200)))
            .run(&CommandLine::new("sleep", ["5"]), dir.path());

        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[test]
    fn missing_program_is_a_process_failure() {
        let dir = tempfile::tempdir().unwrap();
        let result = ShellRunner::default().run(
            &CommandLine::new("git-revgraph-no-such-program", Vec::<String>::new()),
            dir.path(),
        );

        assert!(matches!(result, Err(Error::ProcessFailure { .. })));
    }
}
