// Remuxer - merges a video-only and an audio-only file with ffmpeg

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::errors::{DownloadError, Result};
use super::tools::ToolCommand;
use super::traits::ProcessRunner;

#[derive(Clone)]
pub struct Remuxer {
    runner: Arc<dyn ProcessRunner>,
    command: ToolCommand,
    timeout_secs: u64,
}

impl Remuxer {
    pub fn new(runner: Arc<dyn ProcessRunner>, command: ToolCommand, timeout_secs: u64) -> Self {
        Self {
            runner,
            command,
            timeout_secs,
        }
    }

    /// Video stream copied, audio re-encoded to AAC, output overwritten
    pub fn merge_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-i".to_string(),
            audio.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    /// Merge `video` and `audio` into `output`.
    ///
    /// The inputs are removed only once `output` exists; on any failure they
    /// are left in place.
    pub async fn merge(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        log::info!(
            "[remux] {} + {} -> {}",
            video.display(),
            audio.display(),
            output.display()
        );

        let args = self.command.with_args(Self::merge_args(video, audio, output));
        match self
            .runner
            .run(&self.command.program, args, self.timeout_secs, cancel)
            .await
        {
            Ok(_) => {}
            Err(DownloadError::ExecutionFailed { stderr, .. }) => {
                log::error!("[remux] ffmpeg failed: {}", stderr);
                return Err(DownloadError::MergeFailed(stderr));
            }
            Err(e) => return Err(e),
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(DownloadError::OutputMissing(output.to_path_buf()));
        }

        for input in [video, audio] {
            if let Err(e) = tokio::fs::remove_file(input).await {
                log::warn!("[remux] could not remove {}: {}", input.display(), e);
            }
        }
        Ok(())
    }
}
