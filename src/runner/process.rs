//! Local process runner
//!
//! Spawns the program directly with piped stdio, in a fresh process group so a
//! timeout can take down everything the program forked.

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitid, Id, WaitPidFlag};
use nix::unistd::Pid;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{CommandSpec, RunLimits, RunOutcome, RunStatus, Runner};
use crate::error::{ExecError, Result};

const READ_CHUNK: usize = 8192;

/// Extra time to drain pipes when the program exits right at the deadline
const DRAIN_GRACE: Duration = Duration::from_millis(100);

type OutputTask = JoinHandle<io::Result<Vec<u8>>>;

/// Runner that supervises a local child process
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run a program to completion or until the time budget runs out
    pub async fn execute(
        &self,
        cmd: &CommandSpec,
        limits: &RunLimits,
        stdin_content: &str,
    ) -> Result<RunOutcome> {
        let program = cmd.resolved_program();
        debug!("Running program: {:?} with args: {:?}", program, cmd.args);

        let mut command = Command::new(&program);
        command
            .args(&cmd.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        if let Some(dir) = &cmd.work_dir {
            command.current_dir(dir);
        }

        let started = Instant::now();
        let deadline = started + Duration::from_millis(limits.time_ms);

        let mut child = command.spawn().map_err(ExecError::Spawn)?;
        let pid = child
            .id()
            .map(|id| Pid::from_raw(id as i32))
            .ok_or_else(|| ExecError::Supervision(io::Error::other("child has no pid")))?;

        // Feed stdin from its own task so a child that never reads cannot
        // stall output collection
        let stdin_task = child.stdin.take().map(|mut pipe| {
            let input = stdin_content.to_owned();
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    if e.kind() != io::ErrorKind::BrokenPipe {
                        debug!("Failed to write stdin: {}", e);
                    }
                }
                // pipe dropped here: child sees EOF
            })
        });

        let limit = limits.output_limit_bytes;
        let stdout_task = child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(collect_output(pipe, limit)));
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(collect_output(pipe, limit)));

        // The leader stays unreaped until the group is killed, so its pid
        // cannot be handed to another process group in between
        let exited = tokio::task::spawn_blocking(move || wait_exited(pid));
        let waited = tokio::time::timeout_at(deadline, exited).await;

        // Whatever is left in the group (background grandchildren holding
        // the pipes open) goes down with the program
        kill_process_group(pid);

        if waited.is_err() {
            if let Err(e) = child.start_kill() {
                debug!("Child already gone at timeout: {}", e);
            }
        }
        let reaped = child.wait().await;

        let supervision_error = match waited {
            Err(_) => {
                if let Err(e) = reaped {
                    warn!("Failed to reap timed-out child: {}", e);
                }
                abort_all(stdin_task, [stdout_task, stderr_task]);
                return Ok(timed_out(started));
            }
            Ok(Err(e)) => Some(io::Error::other(e)),
            Ok(Ok(Err(errno))) => Some(io::Error::from(errno)),
            Ok(Ok(Ok(()))) => None,
        };

        let exit_status = match (supervision_error, reaped) {
            (None, Ok(status)) => status,
            (Some(e), _) | (None, Err(e)) => {
                abort_all(stdin_task, [stdout_task, stderr_task]);
                return Err(ExecError::Supervision(e));
            }
        };

        let drain_deadline = deadline.max(Instant::now() + DRAIN_GRACE);
        let collected = tokio::time::timeout_at(drain_deadline, async {
            let stdout = join_output(stdout_task).await?;
            let stderr = join_output(stderr_task).await?;
            Ok::<_, ExecError>((stdout, stderr))
        })
        .await;

        if let Some(task) = stdin_task {
            task.abort();
        }

        let (stdout, stderr) = match collected {
            Ok(result) => result?,
            // Pipes were still held open by something outside the group
            Err(_) => return Ok(timed_out(started)),
        };

        let status = match exit_status.code() {
            Some(code) => RunStatus::Exited(code),
            None => RunStatus::Signaled(exit_status.signal().unwrap_or(-1)),
        };

        let time_ms = started.elapsed().as_millis() as u64;
        debug!(?status, time_ms, "Program finished");

        Ok(RunOutcome {
            status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            time_ms,
        })
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(&self, cmd: &CommandSpec, limits: &RunLimits, stdin: &str) -> Result<RunOutcome> {
        self.execute(cmd, limits, stdin).await
    }
}

fn timed_out(started: Instant) -> RunOutcome {
    RunOutcome {
        status: RunStatus::TimeLimitExceeded,
        stdout: String::new(),
        stderr: String::new(),
        time_ms: started.elapsed().as_millis() as u64,
    }
}

/// Read a pipe to EOF, keeping at most `limit` bytes
async fn collect_output<R: AsyncRead + Unpin>(mut pipe: R, limit: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            return Ok(buf);
        }
        let room = limit.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..n.min(room)]);
    }
}

async fn join_output(task: Option<OutputTask>) -> Result<Vec<u8>> {
    let Some(task) = task else {
        return Ok(Vec::new());
    };
    match task.await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(ExecError::Supervision(e)),
        Err(e) => Err(ExecError::Supervision(io::Error::other(e))),
    }
}

fn abort_all(writer: Option<JoinHandle<()>>, readers: [Option<OutputTask>; 2]) {
    if let Some(task) = writer {
        task.abort();
    }
    for task in readers.into_iter().flatten() {
        task.abort();
    }
}

/// Block until `pid` has exited without reaping it
fn wait_exited(pid: Pid) -> nix::Result<()> {
    loop {
        match waitid(Id::Pid(pid), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT) {
            Err(Errno::EINTR) => continue,
            other => return other.map(|_| ()),
        }
    }
}

/// SIGKILL every process in the group led by `pgid`
fn kill_process_group(pgid: Pid) {
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
    }
}
