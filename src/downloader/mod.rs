// Downloader module - format selection, stream fetching and remuxing

pub mod config;
pub mod errors;
pub mod format_catalog;
pub mod format_selector;
pub mod metadata;
pub mod models;
pub mod orchestrator;
pub mod remux;
pub mod runner;
pub mod tasks;
pub mod tools;
pub mod traits;
pub mod utils;
pub mod ytdlp;

#[cfg(test)]
mod testing;

pub use config::{DownloaderConfig, Timeouts};
pub use errors::{DownloadError, Result};
pub use format_catalog::FormatCatalogParser;
pub use format_selector::StreamSelector;
pub use metadata::MetadataResolver;
pub use models::{
    DownloadEvent, DownloadPlan, DownloadResult, PlanKind, ProcessOutput, StreamDescriptor,
    StreamKind, TaskKind, VideoMetadata,
};
pub use orchestrator::{DownloadOrchestrator, NamingPolicy, OutputTarget};
pub use remux::Remuxer;
pub use runner::SystemRunner;
pub use tasks::{DownloadSession, TaskController};
pub use tools::{ToolCommand, ToolInfo, ToolManager, ToolType, Toolchain};
pub use traits::{ProcessRunner, ProgressEmitter};
pub use ytdlp::YtDlp;
