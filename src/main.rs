use clap::Parser;
use yt_format_downloader::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose);

    cli::run(cli).await?;

    Ok(())
}
