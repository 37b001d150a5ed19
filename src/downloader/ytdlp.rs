// yt-dlp invocations: metadata JSON, format listing and single-format downloads

use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::config::DownloaderConfig;
use super::errors::Result;
use super::models::ProcessOutput;
use super::tools::ToolCommand;
use super::traits::ProcessRunner;

lazy_static::lazy_static! {
    static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
}

/// Find the file yt-dlp announced as its download destination
pub fn parse_destination(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .find_map(|line| DEST_RE.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| PathBuf::from(m.as_str().trim()))
}

#[derive(Clone)]
pub struct YtDlp {
    runner: Arc<dyn ProcessRunner>,
    command: ToolCommand,
    config: DownloaderConfig,
}

impl YtDlp {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        command: ToolCommand,
        config: DownloaderConfig,
    ) -> Self {
        Self {
            runner,
            command,
            config,
        }
    }

    /// `--dump-json --no-download <network> <url>`
    pub fn metadata_args(&self, url: &str) -> Vec<String> {
        let mut args = vec!["--dump-json".to_string(), "--no-download".to_string()];
        args.extend(self.config.network_args());
        args.push(url.to_string());
        args
    }

    /// Same as `metadata_args`, restricted to one format
    pub fn format_json_args(&self, url: &str, format_id: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-download".to_string(),
            "--format".to_string(),
            format_id.to_string(),
        ];
        args.extend(self.config.network_args());
        args.push(url.to_string());
        args
    }

    pub fn list_formats_args(&self, url: &str) -> Vec<String> {
        let mut args = vec!["--list-formats".to_string()];
        args.extend(self.config.network_args());
        args.push(url.to_string());
        args
    }

    /// `--format <id> --output <template> --no-playlist <url>`
    pub fn download_args(&self, format_id: &str, template: &str, url: &str) -> Vec<String> {
        vec![
            "--format".to_string(),
            format_id.to_string(),
            "--output".to_string(),
            template.to_string(),
            "--no-playlist".to_string(),
            url.to_string(),
        ]
    }

    pub async fn dump_json(&self, url: &str, cancel: &CancellationToken) -> Result<String> {
        let output = self
            .invoke(self.metadata_args(url), self.config.timeouts.metadata, cancel)
            .await?;
        Ok(output.stdout)
    }

    pub async fn dump_format_json(
        &self,
        url: &str,
        format_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let output = self
            .invoke(self.format_json_args(url, format_id), self.config.timeouts.size, cancel)
            .await?;
        Ok(output.stdout)
    }

    pub async fn list_formats(&self, url: &str, cancel: &CancellationToken) -> Result<String> {
        let output = self
            .invoke(self.list_formats_args(url), self.config.timeouts.catalog, cancel)
            .await?;
        Ok(output.stdout)
    }

    /// Fetch one format into `template`; yt-dlp fills in `%(ext)s` / `%(title)s`
    pub async fn download(
        &self,
        format_id: &str,
        template: &str,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput> {
        log::info!("[yt-dlp] downloading format {} -> {}", format_id, template);
        self.invoke(
            self.download_args(format_id, template, url),
            self.config.timeouts.download,
            cancel,
        )
        .await
    }

    async fn invoke(
        &self,
        args: Vec<String>,
        timeout_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput> {
        let args = self.command.with_args(args);
        log::debug!("[yt-dlp] {} {}", self.command.program, args.join(" "));
        self.runner
            .run(&self.command.program, args, timeout_secs, cancel)
            .await
    }
}
