use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ExecError;
use crate::runner::{RunOutcome, RunStatus};

/// Message reported when the run phase exceeds its budget
pub const TIME_LIMIT_MESSAGE: &str = "Time limit exceeded";

/// Terminal status of an execution request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    /// Waiting for an execution slot; never the status of a returned outcome
    #[default]
    Queued,
    Failed,
    Timeout,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Queued => "queued",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Timeout => "timeout",
        };
        write!(f, "{}", s)
    }
}

/// What the caller gets back for every request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub stdout: String,
    pub stderr: String,
    pub status: ExecutionStatus,
}

impl ExecutionOutcome {
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            status: ExecutionStatus::Failed,
        }
    }

    /// Output captured before the timeout is dropped on purpose
    pub fn timeout() -> Self {
        Self {
            stdout: String::new(),
            stderr: TIME_LIMIT_MESSAGE.to_string(),
            status: ExecutionStatus::Timeout,
        }
    }

    pub fn from_run(run: RunOutcome) -> Self {
        let status = match run.status {
            RunStatus::TimeLimitExceeded => return Self::timeout(),
            RunStatus::Exited(0) => ExecutionStatus::Completed,
            RunStatus::Exited(_) | RunStatus::Signaled(_) => ExecutionStatus::Failed,
        };
        Self {
            stdout: run.stdout,
            stderr: run.stderr,
            status,
        }
    }

    pub fn from_error(err: &ExecError) -> Self {
        Self::failed(err.to_string())
    }
}

impl From<crate::error::Result<RunOutcome>> for ExecutionOutcome {
    fn from(result: crate::error::Result<RunOutcome>) -> Self {
        match result {
            Ok(run) => Self::from_run(run),
            Err(err) => Self::from_error(&err),
        }
    }
}
