//! Execution pipeline
//!
//! Screen → materialize workspace → compile (if needed) → supervised run →
//! outcome. The workspace is destroyed right before the outcome is built,
//! whichever step ended the request.
//!
//! Admission is bounded by a semaphore: a request that has been submitted but
//! has no execution slot yet is `queued`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::compiler;
use crate::config::ExecutorConfig;
use crate::error::{ExecError, Result};
use crate::languages::LanguageRegistry;
use crate::model::{ExecutionOutcome, ExecutionRequest, ExecutionStatus};
use crate::runner::{ProcessRunner, RunLimits, RunOutcome, Runner};
use crate::screener::Screener;
use crate::workspace::Workspace;

/// Global counter for request IDs
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> u64 {
    REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Where a submitted request currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for an execution slot
    Queued,
    /// Holding a slot: screening, compiling or running
    Running,
    /// Finished with the given status
    Done(ExecutionStatus),
}

impl Phase {
    /// Status as seen by callers; `None` while the request is running
    pub fn status(&self) -> Option<ExecutionStatus> {
        match self {
            Phase::Queued => Some(ExecutionStatus::Queued),
            Phase::Running => None,
            Phase::Done(status) => Some(*status),
        }
    }
}

/// Handle to a submitted request
pub struct ExecutionHandle {
    request_id: u64,
    phase: watch::Receiver<Phase>,
    task: JoinHandle<ExecutionOutcome>,
}

impl ExecutionHandle {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Wait until the request reaches `phase` or finishes
    pub async fn wait_for_phase(&mut self, phase: Phase) {
        let _ = self
            .phase
            .wait_for(|p| *p == phase || matches!(p, Phase::Done(_)))
            .await;
    }

    /// Wait for the outcome
    pub async fn wait(self) -> ExecutionOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(request_id = self.request_id, "Execution task failed: {}", e);
                ExecutionOutcome::failed(format!("Execution task failed: {}", e))
            }
        }
    }
}

struct Inner {
    config: ExecutorConfig,
    registry: LanguageRegistry,
    screener: Screener,
    runner: Arc<dyn Runner>,
    slots: Arc<Semaphore>,
}

/// Runs submissions end to end. Cheap to clone; clones share the slot pool.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<Inner>,
}

impl Executor {
    /// Executor running programs as local child processes
    pub fn new(config: ExecutorConfig) -> anyhow::Result<Self> {
        let registry = match &config.languages_path {
            Some(path) => LanguageRegistry::from_file(path)?,
            None => LanguageRegistry::builtin()?,
        };
        Self::with_runner(config, registry, Arc::new(ProcessRunner::new()))
    }

    pub fn with_runner(
        config: ExecutorConfig,
        registry: LanguageRegistry,
        runner: Arc<dyn Runner>,
    ) -> anyhow::Result<Self> {
        if config.max_concurrent == 0 {
            anyhow::bail!("max_concurrent must be at least 1");
        }
        let screener = Screener::new()?;
        let slots = Arc::new(Semaphore::new(config.max_concurrent));

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                registry,
                screener,
                runner,
                slots,
            }),
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.inner.registry
    }

    /// Execution slots not currently taken
    pub fn available_slots(&self) -> usize {
        self.inner.slots.available_permits()
    }

    /// Start a request in the background
    pub fn submit(&self, request: ExecutionRequest) -> ExecutionHandle {
        let request_id = next_request_id();
        let (phase_tx, phase_rx) = watch::channel(Phase::Queued);
        let inner = Arc::clone(&self.inner);

        let task = tokio::spawn(async move {
            let outcome = match Arc::clone(&inner.slots).acquire_owned().await {
                Ok(_permit) => {
                    let _ = phase_tx.send(Phase::Running);
                    inner.run_request(request_id, &request).await
                }
                Err(_) => ExecutionOutcome::failed("Executor is shut down"),
            };
            let _ = phase_tx.send(Phase::Done(outcome.status));
            outcome
        });

        debug!(request_id, "Request queued");

        ExecutionHandle {
            request_id,
            phase: phase_rx,
            task,
        }
    }

    /// Run a request and wait for its outcome
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionOutcome {
        self.submit(request).wait().await
    }
}

impl Inner {
    async fn run_request(&self, request_id: u64, request: &ExecutionRequest) -> ExecutionOutcome {
        info!(
            request_id,
            language_id = request.language_id,
            source_len = request.source_code.len(),
            timeout_ms = request.timeout_ms,
            "Execution started"
        );

        let mut workspace = None;
        let result = self.run_pipeline(request_id, request, &mut workspace).await;
        if let Ok(run) = &result {
            debug!(request_id, status = ?run.status, time_ms = run.time_ms, "Program exited");
        }

        if let Some(mut ws) = workspace {
            ws.destroy();
        }

        if let Err(ref e) = result {
            match e {
                ExecError::Rejected(_)
                | ExecError::Compile(_)
                | ExecError::NotSupported(_)
                | ExecError::InvalidRequest(_) => {
                    info!(request_id, "Request refused: {}", e)
                }
                _ => warn!(request_id, "Execution error: {}", e),
            }
        }

        let outcome = ExecutionOutcome::from(result);
        info!(request_id, status = %outcome.status, "Execution finished");
        outcome
    }

    async fn run_pipeline(
        &self,
        request_id: u64,
        request: &ExecutionRequest,
        workspace: &mut Option<Workspace>,
    ) -> Result<RunOutcome> {
        if request.timeout_ms == 0 {
            return Err(ExecError::InvalidRequest(
                "Timeout must be a positive number of milliseconds".to_string(),
            ));
        }

        self.screener.screen(&request.source_code)?;

        let lang = self.registry.resolve(request.language_id)?;

        let ws = workspace.insert(
            Workspace::materialize(
                &self.config.workspace_root,
                request_id,
                lang,
                &request.source_code,
            )
            .await
            .map_err(ExecError::Workspace)?,
        );

        let cmd = compiler::prepare(lang, ws, self.config.compile_timeout_ms).await?;

        let limits = RunLimits::new(request.timeout_ms, self.config.output_limit_bytes);
        self.runner.run(&cmd, &limits, &request.stdin).await
    }
}

/// Process-wide executor built from the environment on first use
static DEFAULT_EXECUTOR: OnceLock<Executor> = OnceLock::new();

fn default_executor() -> anyhow::Result<&'static Executor> {
    if let Some(executor) = DEFAULT_EXECUTOR.get() {
        return Ok(executor);
    }
    let executor = Executor::new(ExecutorConfig::from_env()?)?;
    Ok(DEFAULT_EXECUTOR.get_or_init(|| executor))
}

/// Run one snippet with the process-wide executor
pub async fn execute_code(
    language_id: u32,
    source_code: &str,
    stdin: &str,
    timeout_ms: u64,
) -> ExecutionOutcome {
    let executor = match default_executor() {
        Ok(executor) => executor,
        Err(e) => {
            error!("Failed to initialize executor: {:#}", e);
            return ExecutionOutcome::failed(format!("Executor unavailable: {:#}", e));
        }
    };
    executor
        .execute(ExecutionRequest::new(language_id, source_code, stdin, timeout_ms))
        .await
}
