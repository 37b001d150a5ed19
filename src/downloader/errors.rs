// Error types for the download pipeline

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// yt-dlp, ffmpeg or python could not be located or spawned
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Child process exceeded its per-call bound and was killed
    #[error("{program} timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    /// Child process exited with a non-zero code
    #[error("{program} failed (exit code {code}): {stderr}")]
    ExecutionFailed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("Video is unavailable")]
    VideoUnavailable,

    #[error("Video is private")]
    VideoPrivate,

    #[error("Access denied (HTTP 403)")]
    AccessDenied,

    #[error("Video not found (HTTP 404)")]
    NotFound,

    #[error("Format {0} not found in catalog")]
    FormatNotFound(String),

    #[error("No audio-only stream available to pair with video format {0}")]
    NoCompanionAudio(String),

    #[error("Downloaded files not found (video: {video}, audio: {audio})")]
    DownloadedFilesMissing { video: String, audio: String },

    /// Exit code was zero but no "Destination:" line was printed
    #[error("Could not determine the downloaded file path from yt-dlp output")]
    OutputPathUnresolved,

    #[error("Merge failed: {0}")]
    MergeFailed(String),

    #[error("Merged output was not created: {}", .0.display())]
    OutputMissing(PathBuf),

    #[error("Failed to fetch video info: {0}")]
    MetadataFetchFailed(String),

    /// Catalog fetched fine but contained no format lines
    #[error("No formats available for this video")]
    NoFormats,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Map yt-dlp stderr from a failed metadata fetch onto a typed error.
    ///
    /// "Private video" is checked before "Video unavailable" because yt-dlp
    /// prints both for private uploads.
    pub fn classify_metadata_failure(stderr: &str) -> Self {
        let stderr = stderr.trim();

        if stderr.contains("Private video") {
            return Self::VideoPrivate;
        }
        if stderr.contains("Video unavailable") {
            return Self::VideoUnavailable;
        }
        if stderr.contains("HTTP Error 403") {
            return Self::AccessDenied;
        }
        if stderr.contains("HTTP Error 404") {
            return Self::NotFound;
        }

        Self::MetadataFetchFailed(stderr.to_string())
    }

    /// Captured stderr, when the error carries one
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ExecutionFailed { stderr, .. } => Some(stderr),
            Self::MergeFailed(stderr) => Some(stderr),
            Self::MetadataFetchFailed(stderr) => Some(stderr),
            _ => None,
        }
    }

    /// Whether this came from a missing executable or a timeout
    pub fn is_process_failure(&self) -> bool {
        matches!(self, Self::ToolNotFound(_) | Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
