use serde::{Deserialize, Serialize};

/// One snippet to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// 1 = Python, 2 = C++, 3 = Java
    pub language_id: u32,
    pub source_code: String,
    #[serde(default)]
    pub stdin: String,
    /// Wall-clock budget of the run phase; compilation is not counted
    pub timeout_ms: u64,
}

impl ExecutionRequest {
    pub fn new(
        language_id: u32,
        source_code: impl Into<String>,
        stdin: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            language_id,
            source_code: source_code.into(),
            stdin: stdin.into(),
            timeout_ms,
        }
    }
}
