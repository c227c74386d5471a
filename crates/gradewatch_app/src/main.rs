mod cli;
mod config;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gradewatch_engine::{
    FetchSettings, LoginSettings, PollLoop, ReqwestFetcher, SessionManager,
    SqliteStore, TickOutcome, TranscriptArchive,
};
use watch_logging::watch_info;

use crate::cli::Cli;
use crate::config::{login_url_from_lookup, DotenvSettings};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log.into(), cli.verbose);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    watch_info!("Starting gradewatch");

    let settings = DotenvSettings::new(cli.env_file.clone());
    let login_url = login_url_from_lookup(settings.lookup());

    let fetcher = ReqwestFetcher::new(FetchSettings::default())
        .context("failed to build HTTP client")?;
    let session = SessionManager::new(Arc::new(fetcher), LoginSettings::for_url(login_url));

    let store = SqliteStore::open(&cli.db)
        .with_context(|| format!("failed to open grade database {}", cli.db.display()))?;
    watch_info!("Using grade database {}", cli.db.display());

    let mut poller = PollLoop::new(session, Box::new(settings), store);
    if !cli.no_archive {
        let archive = TranscriptArchive::open(cli.archive_dir.clone())
            .context("failed to prepare transcript archive")?;
        watch_info!("Archiving transcripts to {}", archive.path().display());
        poller = poller.with_archive(archive);
    }

    if cli.once {
        let tick = poller.tick().await;
        return match tick.outcome {
            TickOutcome::Checked(_) => Ok(()),
            TickOutcome::MissingCredentials => {
                anyhow::bail!("credentials are not configured")
            }
            TickOutcome::Failed(err) => Err(err).context("check failed"),
        };
    }

    poller.run_forever().await;
    Ok(())
}
