// Child process execution with timeout and cancellation

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command as TokioCommand};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

use super::errors::{DownloadError, Result};
use super::models::ProcessOutput;
use super::traits::ProcessRunner;

/// Runs real executables via tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(
        &self,
        program: &str,
        args: Vec<String>,
        timeout_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput> {
        log::debug!("[runner] {} {}", program, args.join(" "));

        let mut child = TokioCommand::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => DownloadError::ToolNotFound(program.to_string()),
                _ => DownloadError::Io(e),
            })?;

        let mut stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| pipe_error(program, "stdout"))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| pipe_error(program, "stderr"))?;

        let mut stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout_pipe.read_to_end(&mut buf).await?;
            Ok::<Vec<u8>, io::Error>(buf)
        });
        let mut stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr_pipe.read_to_end(&mut buf).await?;
            Ok::<Vec<u8>, io::Error>(buf)
        });

        // The deadline covers draining the pipes too: a forked helper can keep
        // them open after the direct child has exited.
        let finished = {
            let drained = async {
                tokio::join!(child.wait(), &mut stdout_task, &mut stderr_task)
            };
            tokio::select! {
                finished = timeout(Duration::from_secs(timeout_secs), drained) => Some(finished),
                _ = cancel.cancelled() => None,
            }
        };

        match finished {
            Some(Ok((status, stdout, stderr))) => {
                let status = status?;
                let stdout = collect(stdout)?;
                let stderr = collect(stderr)?;
                let exit_code = status.code().unwrap_or(-1);

                if status.success() {
                    Ok(ProcessOutput {
                        exit_code,
                        stdout,
                        stderr,
                    })
                } else {
                    log::debug!("[runner] {} exited with {}", program, exit_code);
                    Err(DownloadError::ExecutionFailed {
                        program: program.to_string(),
                        code: exit_code,
                        stderr: stderr.trim().to_string(),
                    })
                }
            }
            Some(Err(_)) => {
                log::warn!(
                    "[runner] {} timed out after {}s, killing",
                    program,
                    timeout_secs
                );
                terminate(&mut child, stdout_task, stderr_task).await;
                Err(DownloadError::Timeout {
                    program: program.to_string(),
                    seconds: timeout_secs,
                })
            }
            None => {
                log::info!("[runner] {} cancelled, killing", program);
                terminate(&mut child, stdout_task, stderr_task).await;
                Err(DownloadError::Cancelled)
            }
        }
    }
}

fn pipe_error(program: &str, stream: &str) -> DownloadError {
    DownloadError::Io(io::Error::new(
        io::ErrorKind::Other,
        format!("Failed to capture {} from {}", stream, program),
    ))
}

fn collect(joined: std::result::Result<io::Result<Vec<u8>>, JoinError>) -> Result<String> {
    let bytes = joined
        .map_err(|e| DownloadError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Kill and reap; `Child::kill` waits for the exit status. A child that
/// already exited was reaped by `wait` and only its readers are stopped.
async fn terminate(
    child: &mut Child,
    stdout_task: JoinHandle<io::Result<Vec<u8>>>,
    stderr_task: JoinHandle<io::Result<Vec<u8>>>,
) {
    if let Ok(None) = child.try_wait() {
        if let Err(e) = child.kill().await {
            log::warn!("[runner] failed to kill child: {}", e);
        }
    }
    stdout_task.abort();
    stderr_task.abort();
}
