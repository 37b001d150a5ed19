// MetadataResolver - video info, format catalog and per-format size lookups

use tokio_util::sync::CancellationToken;

use super::errors::{DownloadError, Result};
use super::format_catalog::FormatCatalogParser;
use super::models::{StreamDescriptor, VideoMetadata};
use super::utils::{format_file_size, UNKNOWN_SIZE};
use super::ytdlp::YtDlp;

#[derive(Clone)]
pub struct MetadataResolver {
    ytdlp: YtDlp,
}

impl MetadataResolver {
    pub fn new(ytdlp: YtDlp) -> Self {
        Self { ytdlp }
    }

    /// Fetch title/duration for one video.
    ///
    /// Tool failures are classified from stderr (private, unavailable, 403,
    /// 404); missing tool, timeout and cancellation pass through unchanged.
    pub async fn fetch_metadata(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<VideoMetadata> {
        log::info!("[metadata] fetching info for {}", url);
        let stdout = match self.ytdlp.dump_json(url, cancel).await {
            Ok(stdout) => stdout,
            Err(DownloadError::ExecutionFailed { stderr, .. }) => {
                let err = DownloadError::classify_metadata_failure(&stderr);
                log::warn!("[metadata] {}", err);
                return Err(err);
            }
            Err(e) => return Err(e),
        };
        parse_metadata(&stdout)
    }

    /// Fetch and parse `--list-formats`. An empty catalog is `NoFormats`.
    pub async fn fetch_catalog(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<StreamDescriptor>> {
        let listing = self.ytdlp.list_formats(url, cancel).await?;
        let catalog = FormatCatalogParser::parse(&listing);
        if catalog.is_empty() {
            return Err(DownloadError::NoFormats);
        }
        log::info!("[metadata] {} formats available", catalog.len());
        Ok(catalog)
    }

    /// Human-readable size of one format; any failure gives `UNKNOWN_SIZE`
    pub async fn fetch_format_size(
        &self,
        url: &str,
        format_id: &str,
        cancel: &CancellationToken,
    ) -> String {
        match self.ytdlp.dump_format_json(url, format_id, cancel).await {
            Ok(stdout) => parse_format_size(&stdout, format_id)
                .map(format_file_size)
                .unwrap_or_else(|| UNKNOWN_SIZE.to_string()),
            Err(e) => {
                log::debug!("[metadata] size lookup for {} failed: {}", format_id, e);
                UNKNOWN_SIZE.to_string()
            }
        }
    }
}

/// Parse the `--dump-json` object
pub fn parse_metadata(stdout: &str) -> Result<VideoMetadata> {
    let json: serde_json::Value = serde_json::from_str(stdout.trim())
        .map_err(|e| DownloadError::MetadataFetchFailed(format!("Invalid JSON: {}", e)))?;

    Ok(VideoMetadata {
        title: json["title"].as_str().unwrap_or("video").to_string(),
        duration_seconds: json["duration"].as_f64().unwrap_or(0.0).max(0.0) as u64,
        uploader: json["uploader"].as_str().map(|s| s.to_string()),
    })
}

/// Size in bytes from a format-restricted `--dump-json`: the matching entry in
/// `formats` first, then the top-level fields
pub fn parse_format_size(stdout: &str, format_id: &str) -> Option<u64> {
    let json: serde_json::Value = serde_json::from_str(stdout.trim()).ok()?;
    let get_size = |v: &serde_json::Value| -> Option<u64> {
        v["filesize"]
            .as_u64()
            .or_else(|| v["filesize_approx"].as_u64())
            .filter(|s| *s > 0)
    };

    json["formats"]
        .as_array()
        .and_then(|formats| {
            formats
                .iter()
                .find(|f| f["format_id"].as_str() == Some(format_id))
                .and_then(get_size)
        })
        .or_else(|| get_size(&json))
}
