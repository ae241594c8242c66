use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

use crate::execution::{
    ExecutionResult, ProcessExecutor, ProcessExitStatus, ProcessOutput, ProcessSpawnRequest,
    ProcessWaitFuture, RunningProcess,
};
use crate::models::{CoreError, CoreErrorKind, SourceAction, SourceId};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// How long pipes may stay open after the child exits. Installers that leave
/// a detached process holding the handles would otherwise block forever.
const PIPE_DRAIN_WINDOW: Duration = Duration::from_secs(5);

pub struct TokioProcessExecutor;

impl ProcessExecutor for TokioProcessExecutor {
    fn spawn(&self, request: ProcessSpawnRequest) -> ExecutionResult<Box<dyn RunningProcess>> {
        let mut cmd = tokio::process::Command::new(&request.command.program);
        cmd.args(&request.command.args);

        for (key, value) in &request.command.env {
            cmd.env(key, value);
        }

        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        // Installers launched by winget/choco must not flash console windows.
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let child = cmd.spawn().map_err(|error| {
            process_failure(
                request.source,
                request.action,
                format!(
                    "failed to spawn '{}': {error}",
                    request.command.program.display()
                ),
            )
        })?;

        let pid = child.id();
        let started_at = SystemTime::now();

        Ok(Box::new(TokioRunningProcess {
            child: Mutex::new(Some(child)),
            pid,
            started_at,
            timeout: request.timeout,
            source: request.source,
            action: request.action,
        }))
    }
}

struct TokioRunningProcess {
    child: Mutex<Option<tokio::process::Child>>,
    pid: Option<u32>,
    started_at: SystemTime,
    timeout: Option<Duration>,
    source: SourceId,
    action: SourceAction,
}

impl RunningProcess for TokioRunningProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn wait(self: Box<Self>) -> ProcessWaitFuture {
        let child = self.child.into_inner().ok().flatten();
        let timeout = self.timeout;
        let started_at = self.started_at;
        let source = self.source;
        let action = self.action;
        let pid = self.pid;

        Box::pin(async move {
            let mut child = child.ok_or_else(|| {
                process_failure(source, action, "child process already consumed".to_string())
            })?;

            let stdout_reader = PipeReader::spawn(child.stdout.take());
            let stderr_reader = PipeReader::spawn(child.stderr.take());

            let wait_err = |error: std::io::Error| {
                process_failure(
                    source,
                    action,
                    format!("failed to wait for process: {error}"),
                )
            };

            let status = if let Some(timeout_duration) = timeout {
                match tokio::time::timeout(timeout_duration, child.wait()).await {
                    Ok(result) => result.map_err(wait_err)?,
                    Err(_) => {
                        kill_process_tree(&mut child, pid);
                        let _ = tokio::time::timeout(Duration::from_secs(1), child.wait()).await;
                        stdout_reader.abort();
                        stderr_reader.abort();
                        return Err(CoreError::new(
                            Some(source),
                            Some(action),
                            CoreErrorKind::Timeout,
                            format!("process timed out after {}ms", timeout_duration.as_millis()),
                        ));
                    }
                }
            } else {
                child.wait().await.map_err(wait_err)?
            };

            let (stdout, stderr) = tokio::join!(
                stdout_reader.finish(PIPE_DRAIN_WINDOW),
                stderr_reader.finish(PIPE_DRAIN_WINDOW)
            );

            let finished_at = SystemTime::now();

            let status = match status.code() {
                Some(code) => ProcessExitStatus::ExitCode(code),
                None => ProcessExitStatus::Terminated,
            };

            Ok(ProcessOutput {
                status,
                stdout,
                stderr,
                started_at,
                finished_at,
            })
        })
    }
}

/// Reads a child pipe chunk by chunk into a shared buffer, so bytes already
/// read survive when the reader has to be abandoned.
struct PipeReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl PipeReader {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let task = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return;
            };
            let mut chunk = [0_u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(read) => match sink.lock() {
                        Ok(mut buffer) => buffer.extend_from_slice(&chunk[..read]),
                        Err(_) => break,
                    },
                }
            }
        });
        Self { buffer, task }
    }

    fn abort(&self) {
        self.task.abort();
    }

    /// Waits up to `window` for end of stream, then returns what was read.
    async fn finish(self, window: Duration) -> Vec<u8> {
        let Self { buffer, mut task } = self;
        if tokio::time::timeout(window, &mut task).await.is_err() {
            tracing::warn!(
                window_ms = window.as_millis() as u64,
                "child pipe still open after exit; keeping partial output"
            );
            task.abort();
        }
        let bytes = buffer
            .lock()
            .map(|mut bytes| std::mem::take(&mut *bytes))
            .unwrap_or_default();
        bytes
    }
}

#[cfg(unix)]
fn kill_process_tree(_child: &mut tokio::process::Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        let pgid = -(pid as libc::pid_t);
        unsafe {
            libc::kill(pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut tokio::process::Child, _pid: Option<u32>) {
    let _ = child.start_kill();
}

fn process_failure(source: SourceId, action: SourceAction, message: String) -> CoreError {
    CoreError::new(
        Some(source),
        Some(action),
        CoreErrorKind::ProcessFailure,
        message,
    )
}
