pub mod cli;
pub mod downloader;
