//! Queue payloads exchanged with the web service

use serde::{Deserialize, Serialize};

use crate::model::{ExecutionOutcome, ExecutionRequest, ExecutionStatus};

/// Job received from the Redis queue
#[derive(Debug, Serialize, Deserialize)]
pub struct RunJob {
    pub request_id: String,
    pub language_id: u32,
    pub source_code: String,
    #[serde(default)]
    pub stdin: String,
    pub timeout_ms: u64, // ms
}

impl RunJob {
    pub fn to_request(&self) -> ExecutionRequest {
        ExecutionRequest::new(
            self.language_id,
            self.source_code.clone(),
            self.stdin.clone(),
            self.timeout_ms,
        )
    }
}

/// Result published back for a job
#[derive(Debug, Serialize, Deserialize)]
pub struct RunJobResult {
    pub request_id: String,
    pub stdout: String,
    pub stderr: String,
    pub status: ExecutionStatus,
}

impl RunJobResult {
    pub fn new(request_id: impl Into<String>, outcome: ExecutionOutcome) -> Self {
        Self {
            request_id: request_id.into(),
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            status: outcome.status,
        }
    }
}
