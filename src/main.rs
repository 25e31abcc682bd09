use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        if tracing::dispatcher::has_been_set() {
            tracing::error!("{err:#}");
        } else {
            eprintln!("{err:#}");
        }
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = vidscout::cli::Cli::parse();
    let log_files = vidscout::logging::init(&cli.log_dir).context("init logging")?;
    tracing::debug!(?cli, debug_log = %log_files.debug.display(), "parsed cli");

    match cli.command {
        vidscout::cli::Command::Generate(args) => {
            vidscout::queries::run(args).context("generate")?;
        }
        vidscout::cli::Command::Scrape(args) => {
            vidscout::scrape::run(args).await.context("scrape")?;
        }
        vidscout::cli::Command::Build(args) => {
            vidscout::build::run(args).await.context("build")?;
        }
    }

    Ok(())
}
