use thiserror::Error;

use crate::screener::Rejection;

/// Every way a request can fail before or while running.
///
/// The pipeline never hands these to its caller; they are folded into a
/// `failed` outcome whose stderr is the error's display text.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Unsupported language id: {0}")]
    NotSupported(u32),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Rejected(#[from] Rejection),

    #[error("Failed to prepare workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("{0}")]
    Compile(String),

    #[error("Failed to start program: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to supervise program: {0}")]
    Supervision(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExecError>;
