// Command-line front end over DownloadSession

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::downloader::utils::{format_file_size, list_downloads};
use crate::downloader::{
    DownloadEvent, DownloadSession, DownloaderConfig, OutputTarget, ProcessRunner,
    StreamDescriptor, SystemRunner, ToolManager, Toolchain,
};

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "yt-format-downloader")]
#[command(
    author,
    version,
    about = "Download a chosen YouTube format, merging video-only streams with audio"
)]
pub struct Cli {
    /// Path to yt-dlp (overrides YTFD_YTDLP).
    #[arg(long, global = true)]
    pub ytdlp: Option<String>,

    /// Path to ffmpeg (overrides YTFD_FFMPEG).
    #[arg(long, global = true)]
    pub ffmpeg: Option<String>,

    /// Debug logging unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show title and duration.
    Info { url: String },

    /// List the available formats.
    Formats { url: String },

    /// Look up the size of one format.
    Size {
        url: String,
        #[arg(value_name = "FORMAT_ID")]
        format_id: String,
    },

    /// Download one format; video-only formats are merged with the best audio.
    Download {
        url: String,
        #[arg(value_name = "FORMAT_ID")]
        format_id: String,
        /// Destination directory (overrides YTFD_OUTPUT_DIR).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// File name without extension instead of the video title.
        #[arg(long)]
        name: Option<String>,
    },

    /// Report yt-dlp and ffmpeg availability.
    Tools,

    /// List finished and partial downloads.
    Downloads {
        #[arg(value_name = "DIR")]
        dir: Option<PathBuf>,
    },
}

pub fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = DownloaderConfig::from_env()
        .with_ytdlp_path(cli.ytdlp.clone())
        .with_ffmpeg_path(cli.ffmpeg.clone());
    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner::new());

    match cli.command {
        Commands::Tools => print_tools(runner, config).await,
        Commands::Downloads { dir } => {
            let dir = dir.unwrap_or_else(|| config.output_dir.clone());
            print_downloads(dir).await
        }
        command => {
            let toolchain = Toolchain::discover(runner, config.clone())
                .await
                .context("yt-dlp is required")?;
            let (tx, mut rx) = mpsc::unbounded_channel();
            let mut session = DownloadSession::new(&toolchain, tx);
            run_session(command, &config, &mut session, &mut rx).await
        }
    }
}

async fn run_session(
    command: Commands,
    config: &DownloaderConfig,
    session: &mut DownloadSession,
    rx: &mut UnboundedReceiver<DownloadEvent>,
) -> anyhow::Result<()> {
    match command {
        Commands::Info { url } => {
            session.request_metadata(&url).await;
            if let DownloadEvent::MetadataReady(meta) = next_outcome(session, rx).await? {
                println!("Title:    {}", meta.title);
                println!("Duration: {}", meta.formatted_duration());
                if let Some(uploader) = meta.uploader {
                    println!("Uploader: {}", uploader);
                }
            }
        }
        Commands::Formats { url } => {
            let catalog = fetch_catalog(&url, session, rx).await?;
            print_catalog(&catalog, session.can_merge());
        }
        Commands::Size { url, format_id } => {
            session.request_size(&url, &format_id).await;
            let outcome = next_outcome(session, rx).await?;
            if let DownloadEvent::SizeReady { format_id, label } = outcome {
                println!("{}: {}", format_id, label);
            }
        }
        Commands::Download {
            url,
            format_id,
            output,
            name,
        } => {
            let catalog = fetch_catalog(&url, session, rx).await?;
            let dir = output.unwrap_or_else(|| config.output_dir.clone());
            let target = OutputTarget::new(dir).with_stem(name);
            session.request_download(&url, catalog, &format_id, target).await;

            if let DownloadEvent::Finished(result) = next_outcome(session, rx).await? {
                if !result.success {
                    bail!("{}: {}", result.summary(), result.message);
                }
                println!("{}", result.message);
                if let Some(path) = result.final_file_path {
                    println!("Saved to {}", path.display());
                }
            }
        }
        Commands::Tools | Commands::Downloads { .. } => {}
    }
    Ok(())
}

async fn fetch_catalog(
    url: &str,
    session: &mut DownloadSession,
    rx: &mut UnboundedReceiver<DownloadEvent>,
) -> anyhow::Result<Vec<StreamDescriptor>> {
    session.request_catalog(url).await;
    match next_outcome(session, rx).await? {
        DownloadEvent::CatalogReady(catalog) => Ok(catalog),
        other => bail!("unexpected event: {:?}", other),
    }
}

/// Print progress until a terminal event arrives. Ctrl-C cancels everything.
async fn next_outcome(
    session: &mut DownloadSession,
    rx: &mut UnboundedReceiver<DownloadEvent>,
) -> anyhow::Result<DownloadEvent> {
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(DownloadEvent::Progress(text)) => println!("{}", text),
                Some(DownloadEvent::Failed { message, .. }) => bail!("{}", message),
                Some(event) => return Ok(event),
                None => bail!("event channel closed"),
            },
            _ = tokio::signal::ctrl_c() => {
                session.cancel_all().await;
                bail!("Cancelled");
            }
        }
    }
}

fn print_catalog(catalog: &[StreamDescriptor], can_merge: bool) {
    println!("{:<8} {:<6} {:<12} {:<12} NOTE", "ID", "EXT", "QUALITY", "TYPE");
    for d in catalog {
        let marker = if d.is_video_only() && !can_merge {
            "  (needs ffmpeg)"
        } else {
            ""
        };
        println!(
            "{:<8} {:<6} {:<12} {:<12} {}{}",
            d.id,
            d.container,
            d.quality_tag,
            d.kind().label(),
            d.note,
            marker
        );
    }
}

async fn print_tools(
    runner: Arc<dyn ProcessRunner>,
    config: DownloaderConfig,
) -> anyhow::Result<()> {
    let manager = ToolManager::new(runner, config);
    for tool in manager.get_all_tools().await {
        let status = if tool.is_available { "ok" } else { "missing" };
        println!("{:<8} {}", tool.name, status);
        if let Some(path) = &tool.path {
            println!("  path:    {}", path);
        }
        if let Some(version) = &tool.version {
            println!("  version: {}", version);
        }
        if let Some(aac) = tool.supports_aac {
            println!("  aac:     {}", if aac { "yes" } else { "no" });
        }
    }
    Ok(())
}

async fn print_downloads(dir: PathBuf) -> anyhow::Result<()> {
    let listing = list_downloads(&dir)
        .await
        .with_context(|| format!("cannot read {}", dir.display()))?;

    if listing.media.is_empty() {
        println!("No downloads in {}", dir.display());
    }
    for file in &listing.media {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        println!(
            "{:<50} {:>10}  {}",
            name,
            format_file_size(file.size_bytes),
            file.modified.as_deref().unwrap_or("")
        );
    }
    for part in &listing.incomplete {
        println!("incomplete: {}", part.display());
    }
    println!("Total: {}", format_file_size(listing.total_bytes));
    Ok(())
}
