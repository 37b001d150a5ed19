// Tool discovery - locating yt-dlp and ffmpeg, version and AAC checks

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::config::DownloaderConfig;
use super::errors::{DownloadError, Result};
use super::remux::Remuxer;
use super::traits::ProcessRunner;
use super::ytdlp::YtDlp;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version", // ffmpeg uses a single dash
        }
    }
}

/// How to invoke a tool: program plus leading arguments
/// (`python3 -m yt_dlp` when only the Python module is installed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    pub prefix: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prefix: Vec::new(),
        }
    }

    pub fn python_module(python: impl Into<String>, module: &str) -> Self {
        Self {
            program: python.into(),
            prefix: vec!["-m".to_string(), module.to_string()],
        }
    }

    /// Prefix followed by `args`
    pub fn with_args(&self, args: Vec<String>) -> Vec<String> {
        let mut full = self.prefix.clone();
        full.extend(args);
        full
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.prefix.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
    /// ffmpeg only: whether an AAC encoder is listed by `-codecs`
    pub supports_aac: Option<bool>,
}

pub struct ToolManager {
    runner: Arc<dyn ProcessRunner>,
    config: DownloaderConfig,
}

impl ToolManager {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: DownloaderConfig) -> Self {
        Self { runner, config }
    }

    /// Locate a tool or fail with `ToolNotFound`
    pub async fn resolve(&self, tool_type: ToolType) -> Result<ToolCommand> {
        self.locate(tool_type)
            .await
            .ok_or_else(|| DownloadError::ToolNotFound(tool_type.as_str().to_string()))
    }

    pub async fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let command = self.locate(tool_type).await;
        let version = match &command {
            Some(cmd) => self.get_version(cmd, tool_type).await,
            None => None,
        };
        let supports_aac = match (&command, tool_type) {
            (Some(cmd), ToolType::Ffmpeg) => Some(self.supports_aac(cmd).await),
            _ => None,
        };

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            is_available: command.is_some() && version.is_some(),
            path: command.map(|c| c.display()),
            version,
            supports_aac,
        }
    }

    pub async fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp).await,
            self.get_tool_info(ToolType::Ffmpeg).await,
        ]
    }

    async fn locate(&self, tool_type: ToolType) -> Option<ToolCommand> {
        let configured = match tool_type {
            ToolType::YtDlp => self.config.ytdlp_path.as_deref(),
            ToolType::Ffmpeg => self.config.ffmpeg_path.as_deref(),
        };
        if let Some(path) = configured {
            return Some(ToolCommand::new(path));
        }

        let binary_name = tool_type.as_str();

        // 1. Try common paths first
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];
        for path in common_paths {
            if Path::new(&path).is_file() {
                return Some(ToolCommand::new(path));
            }
        }

        // 2. Try PATH
        if let Some(path) = self.which(binary_name).await {
            return Some(ToolCommand::new(path));
        }

        // 3. yt-dlp can also run as a Python module
        if tool_type == ToolType::YtDlp {
            let module = ToolCommand::python_module(&self.config.python, "yt_dlp");
            if self.get_version(&module, tool_type).await.is_some() {
                log::info!("[tools] using {} for yt-dlp", module.display());
                return Some(module);
            }
        }

        None
    }

    async fn which(&self, binary_name: &str) -> Option<String> {
        let output = self
            .runner
            .run(
                "which",
                vec![binary_name.to_string()],
                self.config.timeouts.version_probe,
                &CancellationToken::new(),
            )
            .await
            .ok()?;
        let path = output.stdout.trim();
        (!path.is_empty()).then(|| path.to_string())
    }

    async fn get_version(&self, command: &ToolCommand, tool_type: ToolType) -> Option<String> {
        let args = command.with_args(vec![tool_type.version_arg().to_string()]);
        match self
            .runner
            .run(
                &command.program,
                args,
                self.config.timeouts.version_probe,
                &CancellationToken::new(),
            )
            .await
        {
            // ffmpeg prints a banner; the first line holds the version
            Ok(output) => output
                .stdout
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string),
            Err(e) => {
                log::debug!("[tools] {} version probe failed: {}", command.display(), e);
                None
            }
        }
    }

    async fn supports_aac(&self, command: &ToolCommand) -> bool {
        let args = command.with_args(vec!["-hide_banner".to_string(), "-codecs".to_string()]);
        match self
            .runner
            .run(
                &command.program,
                args,
                self.config.timeouts.version_probe,
                &CancellationToken::new(),
            )
            .await
        {
            Ok(output) => output.stdout.to_lowercase().contains("aac"),
            Err(_) => false,
        }
    }
}

/// Resolved executables for one session
#[derive(Clone)]
pub struct Toolchain {
    pub ytdlp: YtDlp,
    /// None when ffmpeg is missing; video-only formats cannot be merged then
    pub remuxer: Option<Remuxer>,
}

impl Toolchain {
    /// Locate yt-dlp (required) and ffmpeg (optional)
    pub async fn discover(
        runner: Arc<dyn ProcessRunner>,
        config: DownloaderConfig,
    ) -> Result<Self> {
        let manager = ToolManager::new(runner.clone(), config.clone());
        let ytdlp_command = manager.resolve(ToolType::YtDlp).await?;
        let remuxer = match manager.resolve(ToolType::Ffmpeg).await {
            Ok(command) => Some(Remuxer::new(runner.clone(), command, config.timeouts.remux)),
            Err(e) => {
                log::warn!("[tools] {}; video-only formats cannot be merged", e);
                None
            }
        };

        log::info!("[tools] yt-dlp: {}", ytdlp_command.display());
        Ok(Self {
            ytdlp: YtDlp::new(runner, ytdlp_command, config),
            remuxer,
        })
    }
}
