// Process runner trait and progress emitter

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::errors::Result;
use super::models::{DownloadEvent, ProcessOutput};

/// Runs an external command to completion.
///
/// Implementations return `Ok` only for exit code 0. A non-zero exit is
/// `ExecutionFailed` with captured stderr, a missing executable is
/// `ToolNotFound`, an overrun is `Timeout` and a fired `cancel` token is
/// `Cancelled`. In the last two cases the child must be killed and reaped
/// before returning. No retries happen at this layer.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: Vec<String>,
        timeout_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput>;
}

/// Progress emitter helper
#[derive(Debug, Clone, Default)]
pub struct ProgressEmitter {
    sender: Option<UnboundedSender<DownloadEvent>>,
}

impl ProgressEmitter {
    pub fn new(sender: UnboundedSender<DownloadEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Emitter that drops everything
    pub fn silent() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, event: DownloadEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn progress(&self, status: impl Into<String>) {
        self.emit(DownloadEvent::Progress(status.into()));
    }
}
