use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    akniga_dl::logging::init().context("init logging")?;

    let cli = akniga_dl::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    akniga_dl::download::run(cli.download)
        .await
        .context("download")?;

    Ok(())
}
