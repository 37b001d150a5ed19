// Scripted ProcessRunner for unit tests

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::errors::{DownloadError, Result};
use super::models::ProcessOutput;
use super::traits::ProcessRunner;

/// What the next invocation does
#[derive(Debug, Clone)]
pub enum Step {
    /// Exit 0 with this stdout
    Success(String),
    /// Non-zero exit with this stderr
    Failure(i32, String),
    Timeout,
    Missing,
    /// Write a file from the `--output` template (ext filled in) and
    /// announce it on a Destination line, like yt-dlp does
    Download(&'static str),
    /// Like `Download`, but without the Destination line
    DownloadQuietly(&'static str),
    /// Exit 0 without writing anything
    Nothing,
    /// Write the last argument as a file, like ffmpeg does
    WriteLastArg,
}

pub struct ScriptedRunner {
    steps: Mutex<VecDeque<Step>>,
    default: Step,
    calls: Mutex<Vec<(String, Vec<String>, u64)>>,
}

impl ScriptedRunner {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            default: Step::Missing,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Step used once the script runs out
    pub fn with_default(mut self, step: Step) -> Self {
        self.default = step;
        self
    }

    /// (program, args, timeout) of every invocation so far
    pub fn calls(&self) -> Vec<(String, Vec<String>, u64)> {
        self.calls.lock().unwrap().clone()
    }
}

fn ok(stdout: String) -> Result<ProcessOutput> {
    Ok(ProcessOutput {
        exit_code: 0,
        stdout,
        stderr: String::new(),
    })
}

fn write_from_template(args: &[String], ext: &str) -> PathBuf {
    let pos = args.iter().position(|a| a == "--output").unwrap();
    let template = &args[pos + 1];
    let path = PathBuf::from(
        template
            .replace("%(ext)s", ext)
            .replace("%(title)s", "Scripted Title"),
    );
    std::fs::write(&path, b"media").unwrap();
    path
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &str,
        args: Vec<String>,
        timeout_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.clone(), timeout_secs));

        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        match step {
            Step::Success(stdout) => ok(stdout),
            Step::Failure(code, stderr) => Err(DownloadError::ExecutionFailed {
                program: program.to_string(),
                code,
                stderr,
            }),
            Step::Timeout => Err(DownloadError::Timeout {
                program: program.to_string(),
                seconds: timeout_secs,
            }),
            Step::Missing => Err(DownloadError::ToolNotFound(program.to_string())),
            Step::Download(ext) => {
                let path = write_from_template(&args, ext);
                ok(format!("[download] Destination: {}\n", path.display()))
            }
            Step::DownloadQuietly(ext) => {
                write_from_template(&args, ext);
                ok(String::new())
            }
            Step::Nothing => ok(String::new()),
            Step::WriteLastArg => {
                let path = args.last().cloned().unwrap_or_default();
                std::fs::write(&path, b"merged").unwrap();
                ok(String::new())
            }
        }
    }
}
