// Common data models for the download pipeline

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which elementary streams a catalog entry carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    /// Video and audio in one file
    Combined,
    /// Video track without audio, needs a companion audio stream
    VideoOnly,
    /// Audio track without video
    AudioOnly,
}

impl StreamKind {
    /// Classify from the free-text columns of a `--list-formats` line.
    /// "video only" wins over "audio only"; anything else carries both.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("video only") {
            Self::VideoOnly
        } else if lower.contains("audio only") {
            Self::AudioOnly
        } else {
            Self::Combined
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Combined => "Video+Audio",
            Self::VideoOnly => "Video Only",
            Self::AudioOnly => "Audio Only",
        }
    }
}

/// One row of the format catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Format ID (e.g., "137", "140"), unique within one catalog
    pub id: String,
    /// Container/extension (mp4, webm, m4a)
    pub container: String,
    /// Resolution column as printed
    pub resolution_tag: String,
    /// Normalized "WIDTHxHEIGHT" / "Np" token, or the raw resolution
    pub quality_tag: String,
    /// Remaining columns joined with single spaces
    pub note: String,
    pub has_video: bool,
    pub has_audio: bool,
}

impl StreamDescriptor {
    pub fn kind(&self) -> StreamKind {
        match (self.has_video, self.has_audio) {
            (true, false) => StreamKind::VideoOnly,
            (false, true) => StreamKind::AudioOnly,
            _ => StreamKind::Combined,
        }
    }

    pub fn is_video_only(&self) -> bool {
        self.kind() == StreamKind::VideoOnly
    }

    pub fn is_audio_only(&self) -> bool {
        self.kind() == StreamKind::AudioOnly
    }
}

/// Single-video metadata from `--dump-json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Raw title; sanitize before using it in a path
    pub title: String,
    /// Zero means unknown
    pub duration_seconds: u64,
    pub uploader: Option<String>,
}

impl VideoMetadata {
    /// "m:ss", "h:mm:ss" from one hour, "unknown" when zero
    pub fn formatted_duration(&self) -> String {
        crate::downloader::utils::format_duration(self.duration_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanKind {
    Direct,
    VideoPlusAudio,
    AudioOnly,
}

impl PlanKind {
    /// Status text shown while the plan runs
    pub fn progress_label(&self) -> &'static str {
        match self {
            Self::Direct => "Downloading video with audio...",
            Self::VideoPlusAudio => "Downloading video and audio for merging...",
            Self::AudioOnly => "Downloading audio...",
        }
    }

    /// Headline for a finished download
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Direct => "Video with audio downloaded",
            Self::VideoPlusAudio => "Video and audio downloaded and merged",
            Self::AudioOnly => "Audio downloaded",
        }
    }
}

/// How to fetch the chosen format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadPlan {
    /// Format already carries both tracks
    Direct(String),
    /// (video format, companion audio format), merged afterwards
    VideoPlusAudio(String, String),
    AudioOnly(String),
}

impl DownloadPlan {
    pub fn kind(&self) -> PlanKind {
        match self {
            Self::Direct(_) => PlanKind::Direct,
            Self::VideoPlusAudio(_, _) => PlanKind::VideoPlusAudio,
            Self::AudioOnly(_) => PlanKind::AudioOnly,
        }
    }

    /// The format the user picked
    pub fn primary_id(&self) -> &str {
        match self {
            Self::Direct(id) | Self::AudioOnly(id) => id,
            Self::VideoPlusAudio(video, _) => video,
        }
    }
}

/// Terminal outcome of one download request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub success: bool,
    pub final_file_path: Option<PathBuf>,
    pub message: String,
    /// None when the request failed before a plan was chosen
    pub plan_kind: Option<PlanKind>,
}

impl DownloadResult {
    pub fn succeeded(kind: PlanKind, path: PathBuf, message: String) -> Self {
        Self {
            success: true,
            final_file_path: Some(path),
            message,
            plan_kind: Some(kind),
        }
    }

    pub fn failed(kind: Option<PlanKind>, message: String) -> Self {
        Self {
            success: false,
            final_file_path: None,
            message,
            plan_kind: kind,
        }
    }

    pub fn summary(&self) -> &'static str {
        match (self.success, self.plan_kind) {
            (true, Some(kind)) => kind.summary(),
            (true, None) => "Download finished",
            (false, _) => "Download failed",
        }
    }
}

/// Captured result of a child process that exited with code 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Kinds of background work; at most one of each is live per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Metadata,
    Catalog,
    Size,
    Download,
}

/// Messages delivered from background tasks to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadEvent {
    Progress(String),
    MetadataReady(VideoMetadata),
    CatalogReady(Vec<StreamDescriptor>),
    SizeReady { format_id: String, label: String },
    Finished(DownloadResult),
    Failed { kind: TaskKind, message: String },
}
