//! Code execution worker
//!
//! Runs untrusted Python, C++ and Java snippets against a given input under a
//! wall-clock budget and reports the captured output with a terminal status.
//!
//! Source screening is a best-effort textual pre-filter only. Programs run as
//! plain child processes of the worker; deploy it inside an isolated host or
//! container.

pub mod compiler;
pub mod config;
pub mod error;
pub mod executer;
pub mod jobs;
pub mod languages;
pub mod model;
pub mod redis_manager;
pub mod runner;
pub mod screener;
pub mod workspace;

pub use crate::config::ExecutorConfig;
pub use crate::error::ExecError;
pub use crate::model::{ExecutionOutcome, ExecutionRequest, ExecutionStatus};
pub use crate::executer::{execute_code, ExecutionHandle, Executor, Phase};
