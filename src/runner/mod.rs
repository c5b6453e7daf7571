//! Runner module - Process supervision layer
//!
//! This module provides a unified interface for running a prepared program:
//! - `ProcessRunner`: spawns the program as a local child process in its own
//!   process group and supervises it
//!
//! The runner module does NOT:
//! - Screen source code or compile anything
//! - Decide the status reported to the caller
//! - Own the workspace the program runs in

pub mod process;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Command specification for execution
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    /// Program path or name
    pub program: String,
    /// Arguments to the program
    pub args: Vec<String>,
    /// Working directory
    pub work_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(|a| a.into()).collect();
        self
    }

    pub fn with_work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.work_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Create from a command vector (first element is program, rest are args)
    pub fn from_vec(cmd: &[String]) -> Self {
        let mut iter = cmd.iter();
        let program = iter.next().cloned().unwrap_or_default();
        let args: Vec<String> = iter.cloned().collect();
        Self {
            program,
            args,
            work_dir: None,
        }
    }

    /// Convert to a vector of strings (program + args)
    pub fn to_vec(&self) -> Vec<String> {
        let mut v = vec![self.program.clone()];
        v.extend(self.args.clone());
        v
    }

    /// Program to hand to the OS.
    ///
    /// Relative paths such as `./Program` are anchored at the working
    /// directory; bare names are left for `PATH` lookup.
    pub fn resolved_program(&self) -> PathBuf {
        let program = Path::new(&self.program);
        match &self.work_dir {
            Some(dir) if program.is_relative() && self.program.contains('/') => {
                dir.join(program)
            }
            _ => program.to_path_buf(),
        }
    }
}

/// Limits applied to a single run
#[derive(Debug, Clone)]
pub struct RunLimits {
    /// Wall-clock budget in milliseconds
    pub time_ms: u64,
    /// Bytes kept per output stream; the rest is drained and dropped
    pub output_limit_bytes: usize,
}

impl RunLimits {
    pub fn new(time_ms: u64, output_limit_bytes: usize) -> Self {
        Self {
            time_ms,
            output_limit_bytes,
        }
    }
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            time_ms: 5000,
            output_limit_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Execution status (raw, no outcome interpretation)
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// Program exited normally with given exit code
    Exited(i32),
    /// Killed by signal
    Signaled(i32),
    /// Wall-clock budget ran out and the process group was killed
    TimeLimitExceeded,
}

/// Outcome of running a program
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Execution status
    pub status: RunStatus,
    /// Stdout content (empty after a timeout)
    pub stdout: String,
    /// Stderr content (empty after a timeout)
    pub stderr: String,
    /// Wall-clock time in milliseconds
    pub time_ms: u64,
}

/// Runner trait for executing programs
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run a command with the given limits, feeding it `stdin`
    async fn run(&self, cmd: &CommandSpec, limits: &RunLimits, stdin: &str) -> Result<RunOutcome>;
}

// Re-exports
pub use process::ProcessRunner;
