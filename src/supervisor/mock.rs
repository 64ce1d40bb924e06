use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::ExecutionError;
use crate::supervisor::{CommandRunner, CommandSpec, LineSink, ProcessOutcome};

/// Scripted response for one [`MockRunner`] invocation
#[derive(Debug)]
pub enum MockResponse {
    /// Exit zero after printing the given lines
    Success(Vec<String>),
    /// Exit with the given non-zero code after printing the given lines
    Failure(i32, Vec<String>),
    TimedOut(Vec<String>),
}

/// Command runner for testing without spawning processes.
///
/// Responses are consumed in order; once exhausted every command succeeds
/// with no output. Every invocation is recorded.
#[derive(Default)]
pub struct MockRunner {
    responses: Mutex<VecDeque<MockResponse>>,
    invocations: Mutex<Vec<Invocation>>,
}

/// A command the mock was asked to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: CommandSpec,
    pub echoed: bool,
    /// Contents of any `-F <file>` argument at the time of the call
    pub message_file: Option<String>,
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner::default()
    }

    /// Queue a response for the next unanswered invocation
    pub fn respond(self, response: MockResponse) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(response);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl CommandRunner for MockRunner {
    fn run(
        &self,
        command: &CommandSpec,
        echo: Option<LineSink>,
    ) -> Result<ProcessOutcome, ExecutionError> {
        let message_file = command
            .args
            .iter()
            .position(|arg| arg == "-F")
            .and_then(|i| command.args.get(i + 1))
            .and_then(|path| std::fs::read_to_string(path).ok());

        self.invocations
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(Invocation {
                command: command.clone(),
                echoed: echo.is_some(),
                message_file,
            });

        let response = self
            .responses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
            .unwrap_or(MockResponse::Success(Vec::new()));

        let lines = match &response {
            MockResponse::Success(lines)
            | MockResponse::Failure(_, lines)
            | MockResponse::TimedOut(lines) => lines.clone(),
        };
        if let Some(echo) = &echo {
            for line in &lines {
                echo(line);
            }
        }

        match response {
            MockResponse::Success(_) => Ok(ProcessOutcome {
                exit_code: 0,
                captured_lines: lines,
                timed_out: false,
            }),
            MockResponse::Failure(code, _) => Err(ExecutionError::NonZeroExit {
                command: command.to_string(),
                code,
                log: lines,
            }),
            MockResponse::TimedOut(_) => Err(ExecutionError::TimedOut {
                command: command.to_string(),
                timeout: std::time::Duration::from_secs(300),
                log: lines,
            }),
        }
    }
}
