// Helper functions shared by the pipeline stages

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::Result;

/// Shown whenever a size lookup fails
pub const UNKNOWN_SIZE: &str = "unknown size";

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "avi", "mov", "flv", "m4a", "mp3"];

/// Replace characters that are illegal in file names on common platforms
pub fn sanitize_title(title: &str) -> String {
    lazy_static::lazy_static! {
        static ref ILLEGAL_RE: Regex = Regex::new(r#"[<>:"/\\|?*]"#).unwrap();
    }
    ILLEGAL_RE.replace_all(title, "_").into_owned()
}

/// Human-readable size: GB/MB/KB with one decimal, bytes below 1 KB
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "unknown".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Unix time in seconds, shared by the temp video/audio files of one merge
pub fn correlation_token() -> String {
    time::OffsetDateTime::now_utc().unix_timestamp().to_string()
}

/// A media file found in the output directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// "YYYY-MM-DD HH:MM:SS" (UTC)
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadListing {
    pub media: Vec<DownloadedFile>,
    /// `.part` leftovers from interrupted downloads
    pub incomplete: Vec<PathBuf>,
    pub total_bytes: u64,
}

/// Scan `dir` (non-recursive) for finished and interrupted downloads
pub async fn list_downloads(dir: &Path) -> Result<DownloadListing> {
    let mut listing = DownloadListing::default();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if ext == "part" {
            listing.incomplete.push(path);
        } else if MEDIA_EXTENSIONS.contains(&ext.as_str()) {
            listing.total_bytes += metadata.len();
            listing.media.push(DownloadedFile {
                path,
                size_bytes: metadata.len(),
                modified: metadata.modified().ok().and_then(format_timestamp),
            });
        }
    }

    listing.media.sort_by(|a, b| a.path.cmp(&b.path));
    listing.incomplete.sort();
    Ok(listing)
}

fn format_timestamp(at: SystemTime) -> Option<String> {
    let format =
        time::format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]").ok()?;
    time::OffsetDateTime::from(at).format(&format).ok()
}
