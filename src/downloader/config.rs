// Downloader configuration: tool paths, output directory, network flags and timeouts

use std::path::PathBuf;

/// Per-call timeouts in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub version_probe: u64,
    pub metadata: u64,
    pub catalog: u64,
    pub size: u64,
    pub download: u64,
    pub remux: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            version_probe: 10,
            metadata: 60,
            catalog: 60,
            size: 30,
            download: 300,
            remux: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloaderConfig {
    /// Explicit yt-dlp executable; auto-detected when None
    pub ytdlp_path: Option<String>,
    /// Explicit ffmpeg executable; auto-detected when None
    pub ffmpeg_path: Option<String>,
    /// Interpreter for the `python -m yt_dlp` fallback
    pub python: String,
    pub output_dir: PathBuf,
    pub socket_timeout_secs: u32,
    pub retries: u32,
    pub fragment_retries: u32,
    pub timeouts: Timeouts,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_path: None,
            python: "python3".to_string(),
            output_dir: default_output_dir(),
            socket_timeout_secs: 30,
            retries: 3,
            fragment_retries: 3,
            timeouts: Timeouts::default(),
        }
    }
}

impl DownloaderConfig {
    /// Defaults overridden by `YTFD_YTDLP`, `YTFD_FFMPEG`, `YTFD_OUTPUT_DIR`
    /// and `YTDLP_PYTHON` (e.g. a venv interpreter).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = non_empty("YTFD_YTDLP") {
            config.ytdlp_path = Some(path);
        }
        if let Some(path) = non_empty("YTFD_FFMPEG") {
            config.ffmpeg_path = Some(path);
        }
        if let Some(dir) = non_empty("YTFD_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(python) = non_empty("YTDLP_PYTHON") {
            config.python = python;
        }

        config
    }

    pub fn with_ytdlp_path(mut self, path: Option<String>) -> Self {
        if path.is_some() {
            self.ytdlp_path = path;
        }
        self
    }

    pub fn with_ffmpeg_path(mut self, path: Option<String>) -> Self {
        if path.is_some() {
            self.ffmpeg_path = path;
        }
        self
    }

    /// `--socket-timeout N --retries N --fragment-retries N`
    pub fn network_args(&self) -> Vec<String> {
        vec![
            "--socket-timeout".to_string(),
            self.socket_timeout_secs.to_string(),
            "--retries".to_string(),
            self.retries.to_string(),
            "--fragment-retries".to_string(),
            self.fragment_retries.to_string(),
        ]
    }
}

/// User's Downloads folder, else the working directory
pub fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_tool_contract() {
        let config = DownloaderConfig::default();
        assert_eq!(
            config.network_args(),
            vec!["--socket-timeout", "30", "--retries", "3", "--fragment-retries", "3"]
        );
        assert_eq!(config.timeouts.version_probe, 10);
        assert_eq!(config.timeouts.download, 300);
        assert_eq!(config.timeouts.remux, 300);
        assert_eq!(config.python, "python3");
    }

    #[test]
    fn environment_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            ("YTFD_YTDLP", "/opt/yt-dlp"),
            ("YTFD_OUTPUT_DIR", "/data/videos"),
            ("YTDLP_PYTHON", "/venv/bin/python"),
            ("YTFD_FFMPEG", "   "),
        ]
        .into_iter()
        .collect();

        let config = DownloaderConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.ytdlp_path.as_deref(), Some("/opt/yt-dlp"));
        assert_eq!(config.ffmpeg_path, None);
        assert_eq!(config.output_dir, PathBuf::from("/data/videos"));
        assert_eq!(config.python, "/venv/bin/python");
    }

    #[test]
    fn builder_keeps_existing_path_when_none() {
        let config = DownloaderConfig::default()
            .with_ytdlp_path(Some("/a/yt-dlp".into()))
            .with_ytdlp_path(None);
        assert_eq!(config.ytdlp_path.as_deref(), Some("/a/yt-dlp"));
    }
}
