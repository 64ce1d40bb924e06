//! Supervision of external processes
//!
//! [`ProcessSupervisor`] launches one external program, drains its standard
//! output and standard error while it runs, enforces a wall-clock timeout and
//! classifies the exit status:
//!
//! - exit code zero: [`ProcessOutcome`] with every captured line
//! - non-zero exit: [`ExecutionError::NonZeroExit`] with the code and the log
//! - timeout: [`ExecutionError::TimedOut`] with whatever was captured so far
//!
//! Callers depend on the [`CommandRunner`] trait so orchestration can be
//! tested against [`mock::MockRunner`].

pub mod mock;
pub mod pump;

pub use mock::MockRunner;
pub use pump::{LineSink, OutputPump};

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::ExecutionConfig;
use crate::error::ExecutionError;
use pump::DrainTicker;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);
/// How long readers get to reach end of output after the process exits
const READER_GRACE: Duration = Duration::from_millis(500);

/// A program invocation: what to run, with which arguments, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The argument list as a single space separated string
    pub fn argument_string(&self) -> String {
        self.args.join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Result of a process that exited successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    /// Every stdout and stderr line, in the order drained
    pub captured_lines: Vec<String>,
    pub timed_out: bool,
}

/// Runs commands to completion.
///
/// `echo`, when given, receives each output line while the command runs.
pub trait CommandRunner {
    fn run(
        &self,
        command: &CommandSpec,
        echo: Option<LineSink>,
    ) -> Result<ProcessOutcome, ExecutionError>;
}

/// Runs real processes with a timeout and periodic output draining
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    timeout: Duration,
    drain_interval: Duration,
    kill_on_timeout: bool,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        ProcessSupervisor::from_config(&ExecutionConfig::default())
    }
}

impl ProcessSupervisor {
    pub fn new(timeout: Duration) -> Self {
        ProcessSupervisor {
            timeout,
            ..ProcessSupervisor::default()
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        ProcessSupervisor {
            timeout: config.timeout(),
            drain_interval: config.drain_interval(),
            kill_on_timeout: config.kill_on_timeout,
        }
    }

    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    pub fn with_kill_on_timeout(mut self, kill: bool) -> Self {
        self.kill_on_timeout = kill;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn spawn(&self, command: &CommandSpec) -> Result<Child, ExecutionError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group, so a timeout can take down everything the script started
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd.spawn().map_err(|source| ExecutionError::Spawn {
            command: command.to_string(),
            source,
        })
    }

    /// Polls the child until it exits or the deadline passes.
    ///
    /// Returns `Ok(None)` on timeout.
    fn wait_until(&self, child: &mut Child, started: Instant) -> std::io::Result<Option<ExitStatus>> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                return Ok(None);
            }
            thread::sleep(WAIT_POLL_INTERVAL.min(self.timeout - elapsed));
        }
    }
}

impl CommandRunner for ProcessSupervisor {
    fn run(
        &self,
        command: &CommandSpec,
        echo: Option<LineSink>,
    ) -> Result<ProcessOutcome, ExecutionError> {
        debug!(command = %command, dir = %command.working_dir.display(), "starting process");

        let mut child = self.spawn(command)?;
        let started = Instant::now();

        let pump = OutputPump::new(echo);
        let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(pump.attach(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(pump.attach(stderr, "stderr"));
        }
        pump.seal();

        let ticker = DrainTicker::start(Arc::clone(&pump), self.drain_interval);
        let waited = self.wait_until(&mut child, started);

        let status = match waited {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(command = %command, timeout = ?self.timeout, "process timed out");
                if self.kill_on_timeout {
                    terminate(&mut child, command);
                }
                ticker.stop();
                pump.drain();
                return Err(ExecutionError::TimedOut {
                    command: command.to_string(),
                    timeout: self.timeout,
                    log: pump.into_captured(),
                });
            }
            Err(source) => {
                ticker.stop();
                pump.drain();
                return Err(ExecutionError::Wait {
                    command: command.to_string(),
                    log: pump.into_captured(),
                    source,
                });
            }
        };

        // The ticker is joined before the final drain so the two never overlap.
        ticker.stop();
        settle_readers(readers, command);
        pump.drain();

        let captured_lines = pump.into_captured();
        let exit_code = status.code().unwrap_or(-1);
        debug!(
            command = %command,
            exit_code,
            lines = captured_lines.len(),
            elapsed = ?started.elapsed(),
            "process exited"
        );

        if exit_code != 0 {
            return Err(ExecutionError::NonZeroExit {
                command: command.to_string(),
                code: exit_code,
                log: captured_lines,
            });
        }

        Ok(ProcessOutcome {
            exit_code,
            captured_lines,
            timed_out: false,
        })
    }
}

/// Gives the readers a short grace period to reach end of output.
///
/// Background processes started by the command inherit its pipes and can keep
/// them open long after it exits. Readers still blocked when the grace period
/// ends are left detached; anything they read later is dropped.
fn settle_readers(readers: Vec<JoinHandle<()>>, command: &CommandSpec) {
    let deadline = Instant::now() + READER_GRACE;
    while readers.iter().any(|reader| !reader.is_finished()) && Instant::now() < deadline {
        thread::sleep(WAIT_POLL_INTERVAL);
    }

    for reader in readers {
        if !reader.is_finished() {
            debug!(command = %command, "output still open after exit, detaching reader");
            continue;
        }
        if reader.join().is_err() {
            debug!(command = %command, "output reader panicked");
        }
    }
}

/// Kills the timed out process together with its process group on unix
fn terminate(child: &mut Child, command: &CommandSpec) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        // The child leads its own group, so its pid is the group id
        match killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
            Ok(()) => {
                let _ = child.wait();
                return;
            }
            Err(e) => {
                debug!(command = %command, error = %e, "failed to kill process group, killing the process only");
            }
        }
    }

    if let Err(e) = child.kill() {
        debug!(command = %command, error = %e, "failed to kill timed out process");
        return;
    }
    let _ = child.wait();
}

/// Resolves a program path relative to `working_dir` unless it is absolute
pub fn resolve_program(working_dir: &Path, program: &Path) -> PathBuf {
    if program.is_absolute() {
        program.to_path_buf()
    } else {
        working_dir.join(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_display_quotes_spaces() {
        let spec = CommandSpec::new("git", "/tmp")
            .args(["tag", "1.0.0", "-a", "-F"])
            .arg("/tmp/my message.txt");
        assert_eq!(
            spec.to_string(),
            "git tag 1.0.0 -a -F \"/tmp/my message.txt\""
        );
    }

    #[test]
    fn test_argument_string() {
        let spec = CommandSpec::new("scripts/build.sh", ".").args(["app", "1.1.0"]);
        assert_eq!(spec.argument_string(), "app 1.1.0");
    }

    #[test]
    fn test_default_timeout_is_five_minutes() {
        assert_eq!(ProcessSupervisor::default().timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_resolve_program() {
        let dir = Path::new("/work/app");
        assert_eq!(
            resolve_program(dir, Path::new("scripts/build.sh")),
            PathBuf::from("/work/app/scripts/build.sh")
        );
        assert_eq!(
            resolve_program(dir, Path::new("/opt/build.sh")),
            PathBuf::from("/opt/build.sh")
        );
    }

    #[test]
    fn test_spawn_failure_is_execution_error() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(5));
        let spec = CommandSpec::new("/definitely/not/a/program", std::env::temp_dir());
        let err = supervisor.run(&spec, None).unwrap_err();
        assert!(matches!(err, ExecutionError::Spawn { .. }));
        assert!(err.to_string().contains("/definitely/not/a/program"));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout_and_stderr() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(10))
            .with_drain_interval(Duration::from_millis(20));
        let spec = CommandSpec::new("sh", std::env::temp_dir())
            .args(["-c", "echo out1; echo err1 >&2; echo out2"]);

        let outcome = supervisor.run(&spec, None).unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert!(!outcome.timed_out);

        let stdout: Vec<_> = outcome
            .captured_lines
            .iter()
            .filter(|l| l.starts_with("out"))
            .collect();
        assert_eq!(stdout, vec!["out1", "out2"]);
        assert!(outcome.captured_lines.contains(&"err1".to_string()));
        assert_eq!(outcome.captured_lines.len(), 3);
    }
}
