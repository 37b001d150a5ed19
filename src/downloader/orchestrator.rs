// DownloadOrchestrator - runs a DownloadPlan against yt-dlp and ffmpeg
//
// Direct / AudioOnly: one fetch named by yt-dlp's title template, resolved from
// its "Destination:" line.
// VideoPlusAudio: two fetches into temp_video_<token> / temp_audio_<token>,
// resolved by prefix in the output directory, then merged.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use super::errors::{DownloadError, Result};
use super::format_selector::StreamSelector;
use super::metadata::MetadataResolver;
use super::models::{DownloadPlan, DownloadResult, PlanKind, StreamDescriptor};
use super::remux::Remuxer;
use super::tools::Toolchain;
use super::traits::ProgressEmitter;
use super::utils::{correlation_token, sanitize_title};
use super::ytdlp::{parse_destination, YtDlp};

/// How the final file gets its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingPolicy {
    /// yt-dlp's `%(title)s` for single fetches, the sanitized title for merges
    TitleFromSource,
    /// Caller-chosen file stem; the extension is still decided by the tools
    Stem(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub dir: PathBuf,
    pub naming: NamingPolicy,
}

impl OutputTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            naming: NamingPolicy::TitleFromSource,
        }
    }

    pub fn with_stem(mut self, stem: Option<String>) -> Self {
        if let Some(stem) = stem.filter(|s| !s.trim().is_empty()) {
            self.naming = NamingPolicy::Stem(sanitize_title(stem.trim()));
        }
        self
    }

    fn single_template(&self) -> String {
        let stem = match &self.naming {
            NamingPolicy::TitleFromSource => "%(title)s",
            NamingPolicy::Stem(stem) => stem.as_str(),
        };
        self.dir.join(format!("{}.%(ext)s", stem)).to_string_lossy().to_string()
    }
}

#[derive(Clone)]
pub struct DownloadOrchestrator {
    ytdlp: YtDlp,
    resolver: MetadataResolver,
    remuxer: Option<Remuxer>,
    emitter: ProgressEmitter,
}

impl DownloadOrchestrator {
    pub fn new(toolchain: &Toolchain, emitter: ProgressEmitter) -> Self {
        Self {
            ytdlp: toolchain.ytdlp.clone(),
            resolver: MetadataResolver::new(toolchain.ytdlp.clone()),
            remuxer: toolchain.remuxer.clone(),
            emitter,
        }
    }

    /// Select a plan for `chosen_id` and run it
    pub async fn download(
        &self,
        url: &str,
        catalog: &[StreamDescriptor],
        chosen_id: &str,
        target: &OutputTarget,
        cancel: &CancellationToken,
    ) -> DownloadResult {
        match StreamSelector::select_plan(catalog, chosen_id) {
            Ok(plan) => self.execute(url, &plan, target, cancel).await,
            Err(e) => {
                log::warn!("[orchestrator] {}", e);
                DownloadResult::failed(None, e.to_string())
            }
        }
    }

    /// Run `plan`. Every failure ends up in the returned result.
    pub async fn execute(
        &self,
        url: &str,
        plan: &DownloadPlan,
        target: &OutputTarget,
        cancel: &CancellationToken,
    ) -> DownloadResult {
        let kind = plan.kind();
        log::info!("[orchestrator] {:?} plan for format {}", kind, plan.primary_id());
        match self.run_plan(url, plan, target, cancel).await {
            Ok(path) => {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                log::info!("[orchestrator] done: {}", path.display());
                DownloadResult::succeeded(kind, path, format!("{}: {}", kind.summary(), file_name))
            }
            Err(e) => {
                if e.is_process_failure() {
                    log::error!("[orchestrator] {:?} failed: {}", kind, e);
                } else {
                    log::warn!("[orchestrator] {:?} failed: {}", kind, e);
                }
                if let Some(stderr) = e.stderr() {
                    log::debug!("[orchestrator] tool stderr: {}", stderr);
                }
                DownloadResult::failed(Some(kind), e.to_string())
            }
        }
    }

    async fn run_plan(
        &self,
        url: &str,
        plan: &DownloadPlan,
        target: &OutputTarget,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        if matches!(plan, DownloadPlan::VideoPlusAudio(_, _)) && self.remuxer.is_none() {
            return Err(DownloadError::ToolNotFound("ffmpeg".to_string()));
        }

        tokio::fs::create_dir_all(&target.dir).await?;
        self.emitter.progress(plan.kind().progress_label());

        match plan {
            DownloadPlan::Direct(id) | DownloadPlan::AudioOnly(id) => {
                self.fetch_single(url, id, target, cancel).await
            }
            DownloadPlan::VideoPlusAudio(video_id, audio_id) => {
                self.fetch_and_merge(url, video_id, audio_id, target, cancel)
                    .await
            }
        }
    }

    async fn fetch_single(
        &self,
        url: &str,
        format_id: &str,
        target: &OutputTarget,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let output = self
            .ytdlp
            .download(format_id, &target.single_template(), url, cancel)
            .await?;
        parse_destination(&output.stdout).ok_or(DownloadError::OutputPathUnresolved)
    }

    async fn fetch_and_merge(
        &self,
        url: &str,
        video_id: &str,
        audio_id: &str,
        target: &OutputTarget,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let remuxer = self
            .remuxer
            .as_ref()
            .ok_or_else(|| DownloadError::ToolNotFound("ffmpeg".to_string()))?;

        let stem = match &target.naming {
            NamingPolicy::Stem(stem) => stem.clone(),
            NamingPolicy::TitleFromSource => {
                let metadata = self.resolver.fetch_metadata(url, cancel).await?;
                sanitize_title(&metadata.title)
            }
        };
        let final_path = target.dir.join(format!("{}.mp4", stem));

        let token = correlation_token();
        let video_prefix = format!("temp_video_{}.", token);
        let audio_prefix = format!("temp_audio_{}.", token);

        log::info!("[orchestrator] fetching video {} (token {})", video_id, token);
        self.ytdlp
            .download(video_id, &temp_template(&target.dir, &video_prefix), url, cancel)
            .await?;

        log::info!("[orchestrator] fetching audio {} (token {})", audio_id, token);
        self.ytdlp
            .download(audio_id, &temp_template(&target.dir, &audio_prefix), url, cancel)
            .await?;

        let video_file = find_by_prefix(&target.dir, &video_prefix).await?;
        let audio_file = find_by_prefix(&target.dir, &audio_prefix).await?;
        let (video_file, audio_file) = match (video_file, audio_file) {
            (Some(v), Some(a)) => (v, a),
            (v, a) => {
                return Err(DownloadError::DownloadedFilesMissing {
                    video: describe(v, &video_prefix),
                    audio: describe(a, &audio_prefix),
                })
            }
        };

        self.emitter.progress("Merging video and audio...");
        remuxer
            .merge(&video_file, &audio_file, &final_path, cancel)
            .await?;
        Ok(final_path)
    }

    pub fn can_merge(&self) -> bool {
        self.remuxer.is_some()
    }
}

fn temp_template(dir: &Path, prefix: &str) -> String {
    dir.join(format!("{}%(ext)s", prefix)).to_string_lossy().to_string()
}

fn describe(found: Option<PathBuf>, prefix: &str) -> String {
    match found {
        Some(path) => path.display().to_string(),
        None => format!("no {}*", prefix),
    }
}

/// First finished file in `dir` whose name starts with `prefix`.
/// yt-dlp's `.part` / `.ytdl` leftovers are ignored.
pub async fn find_by_prefix(dir: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    let mut matches = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(prefix) || name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        if entry.file_type().await?.is_file() {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::config::DownloaderConfig;
    use crate::downloader::format_catalog::FormatCatalogParser;
    use crate::downloader::models::DownloadEvent;
    use crate::downloader::testing::{ScriptedRunner, Step};
    use crate::downloader::tools::ToolCommand;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    const LISTING: &str = "\
ID  EXT  RESOLUTION FPS |  FILESIZE  TBR PROTO | VCODEC  ACODEC  MORE INFO
140 m4a  audio only     |   3.38MiB 129k https | audio only mp4a.40.2 medium, m4a_dash
251 webm audio only     |   3.50MiB 134k https | audio only opus  medium, webm_dash
137 mp4  1920x1080   30 |  51.52MiB 1970k https | avc1.640028 video only 1080p, mp4_dash
22  mp4  1280x720    30 |  ~21.20MiB 811k https | avc1.64001F mp4a.40.2 720p
";

    fn orchestrator(
        steps: Vec<Step>,
        with_ffmpeg: bool,
    ) -> (DownloadOrchestrator, Arc<ScriptedRunner>, mpsc::UnboundedReceiver<DownloadEvent>) {
        let runner = Arc::new(ScriptedRunner::new(steps));
        let config = DownloaderConfig::default();
        let toolchain = Toolchain {
            ytdlp: YtDlp::new(runner.clone(), ToolCommand::new("yt-dlp"), config),
            remuxer: with_ffmpeg
                .then(|| Remuxer::new(runner.clone(), ToolCommand::new("ffmpeg"), 300)),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        (DownloadOrchestrator::new(&toolchain, ProgressEmitter::new(tx)), runner, rx)
    }

    fn progress(rx: &mut mpsc::UnboundedReceiver<DownloadEvent>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DownloadEvent::Progress(text) = event {
                out.push(text);
            }
        }
        out
    }

    #[tokio::test]
    async fn direct_download_uses_destination_line() {
        let dir = tempdir().unwrap();
        let (orch, runner, mut rx) = orchestrator(vec![Step::Download("mp4")], true);
        let catalog = FormatCatalogParser::parse(LISTING);

        let result = orch
            .download(
                "u",
                &catalog,
                "22",
                &OutputTarget::new(dir.path()),
                &CancellationToken::new(),
            )
            .await;

        assert!(result.success, "{}", result.message);
        assert_eq!(result.plan_kind, Some(PlanKind::Direct));
        let path = result.final_file_path.unwrap();
        assert_eq!(path, dir.path().join("Scripted Title.mp4"));
        assert_eq!(result.message, "Video with audio downloaded: Scripted Title.mp4");
        assert_eq!(progress(&mut rx), vec!["Downloading video with audio..."]);

        let (_, args, timeout) = runner.calls().remove(0);
        assert_eq!(timeout, 300);
        assert!(args.contains(&"--no-playlist".to_string()));
    }

    #[tokio::test]
    async fn missing_destination_is_unresolved() {
        let dir = tempdir().unwrap();
        let (orch, _, _rx) = orchestrator(vec![Step::DownloadQuietly("m4a")], true);
        let result = orch
            .execute(
                "u",
                &DownloadPlan::AudioOnly("140".into()),
                &OutputTarget::new(dir.path()),
                &CancellationToken::new(),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.plan_kind, Some(PlanKind::AudioOnly));
        assert_eq!(result.message, DownloadError::OutputPathUnresolved.to_string());
    }

    #[tokio::test]
    async fn video_only_is_fetched_and_merged() {
        let dir = tempdir().unwrap();
        let (orch, runner, mut rx) = orchestrator(
            vec![
                Step::Success(r#"{"title": "My/Clip: Part*1", "duration": 90}"#.into()),
                Step::DownloadQuietly("mp4"),
                Step::DownloadQuietly("m4a"),
                Step::WriteLastArg,
            ],
            true,
        );
        let catalog = FormatCatalogParser::parse(LISTING);

        let result = orch
            .download(
                "u",
                &catalog,
                "137",
                &OutputTarget::new(dir.path()),
                &CancellationToken::new(),
            )
            .await;

        assert!(result.success, "{}", result.message);
        let expected = dir.path().join("My_Clip_ Part_1.mp4");
        assert_eq!(result.final_file_path.as_deref(), Some(expected.as_path()));
        assert_eq!(
            result.message,
            "Video and audio downloaded and merged: My_Clip_ Part_1.mp4"
        );
        assert_eq!(
            progress(&mut rx),
            vec!["Downloading video and audio for merging...", "Merging video and audio..."]
        );

        let calls = runner.calls();
        assert_eq!(calls.len(), 4);
        // companion audio is the m4a stream
        assert_eq!(calls[2].1[1], "140");
        assert_eq!(calls[3].0, "ffmpeg");

        // temp files are gone, only the merged file remains
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["My_Clip_ Part_1.mp4".to_string()]);
    }

    #[tokio::test]
    async fn missing_temp_file_stops_before_merge() {
        let dir = tempdir().unwrap();
        let (orch, runner, _rx) = orchestrator(
            vec![
                Step::Success(r#"{"title": "t"}"#.into()),
                Step::DownloadQuietly("mp4"),
                Step::Nothing,
            ],
            true,
        );
        let result = orch
            .execute(
                "u",
                &DownloadPlan::VideoPlusAudio("137".into(), "140".into()),
                &OutputTarget::new(dir.path()),
                &CancellationToken::new(),
            )
            .await;

        assert!(!result.success);
        assert!(result.message.starts_with("Downloaded files not found"));
        assert!(runner.calls().iter().all(|(program, _, _)| program != "ffmpeg"));
    }

    #[tokio::test]
    async fn video_fetch_failure_carries_stderr() {
        let dir = tempdir().unwrap();
        let (orch, runner, _rx) = orchestrator(
            vec![
                Step::Success(r#"{"title": "t"}"#.into()),
                Step::Failure(1, "ERROR: Requested format is not available".into()),
            ],
            true,
        );
        let result = orch
            .execute(
                "u",
                &DownloadPlan::VideoPlusAudio("137".into(), "140".into()),
                &OutputTarget::new(dir.path()),
                &CancellationToken::new(),
            )
            .await;

        assert!(!result.success);
        assert!(result.message.contains("Requested format is not available"));
        // audio fetch never started
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn merge_without_ffmpeg_is_refused_up_front() {
        let dir = tempdir().unwrap();
        let (orch, runner, _rx) = orchestrator(vec![], false);
        let result = orch
            .execute(
                "u",
                &DownloadPlan::VideoPlusAudio("137".into(), "140".into()),
                &OutputTarget::new(dir.path()),
                &CancellationToken::new(),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.message, "Tool not found: ffmpeg");
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_format_fails_without_plan() {
        let dir = tempdir().unwrap();
        let (orch, runner, _rx) = orchestrator(vec![], true);
        let result = orch
            .download("u", &[], "22", &OutputTarget::new(dir.path()), &CancellationToken::new())
            .await;

        assert!(!result.success);
        assert_eq!(result.plan_kind, None);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn stem_naming_skips_title_lookup() {
        let dir = tempdir().unwrap();
        let (orch, runner, _rx) = orchestrator(
            vec![Step::DownloadQuietly("webm"), Step::DownloadQuietly("webm"), Step::WriteLastArg],
            true,
        );
        let target = OutputTarget::new(dir.path()).with_stem(Some("clip:1".into()));
        let result = orch
            .execute(
                "u",
                &DownloadPlan::VideoPlusAudio("248".into(), "251".into()),
                &target,
                &CancellationToken::new(),
            )
            .await;

        assert!(result.success, "{}", result.message);
        assert_eq!(result.final_file_path, Some(dir.path().join("clip_1.mp4")));
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn prefix_lookup_ignores_partial_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("temp_video_7.mp4.part"), b"").unwrap();
        std::fs::write(dir.path().join("temp_video_70.mp4"), b"").unwrap();
        assert_eq!(find_by_prefix(dir.path(), "temp_video_7.").await.unwrap(), None);

        std::fs::write(dir.path().join("temp_video_7.webm"), b"").unwrap();
        assert_eq!(
            find_by_prefix(dir.path(), "temp_video_7.").await.unwrap(),
            Some(dir.path().join("temp_video_7.webm"))
        );
    }

    #[tokio::test]
    async fn cancelled_token_stops_download() {
        let dir = tempdir().unwrap();
        let (orch, _, _rx) = orchestrator(vec![Step::Download("mp4")], true);
        let token = CancellationToken::new();
        token.cancel();
        let result = orch
            .execute(
                "u",
                &DownloadPlan::Direct("22".into()),
                &OutputTarget::new(dir.path()),
                &token,
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.message, "Operation cancelled");
    }
}
