mod cli;

use std::fs::File;
use std::io::{self, BufReader};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use query_audit::{config, feed, Dispatcher, Outcome};

use crate::cli::Cli;

fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let mut cfg = config::load(&cli.config)?;

    if let Some(ref log_file) = cli.log_file {
        cfg.log_file = log_file.clone();
    }
    if let Some(ref tables) = cli.tables {
        cfg.log_tables = tables.clone();
    }
    if let Some(ref databases) = cli.databases {
        cfg.log_databases = databases.clone();
    }
    if cli.no_flush {
        cfg.always_fflush = false;
    }

    // 3. Init tracing-subscriber with JSON format.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .init();

    info!(
        config_file = %cli.config.display(),
        log_file = %cfg.log_file.display(),
        "query-audit starting"
    );

    // 4. Open the audit log; refuse to run without it.
    let dispatcher = Dispatcher::start(&cfg).context("failed to start query audit")?;

    // 5. Replay the event feed.
    let summary = match cli.feed {
        Some(ref path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open event feed: {}", path.display()))?;
            feed::replay(BufReader::new(file), &dispatcher)
        }
        None => feed::replay(io::stdin().lock(), &dispatcher),
    };

    // 6. Always close the log, even if the feed failed part-way.
    dispatcher.shutdown();
    let summary = summary?;

    info!(
        sessions = summary.sessions,
        recorded = summary.count(Outcome::Recorded),
        unflushed = summary.count(Outcome::RecordUnflushed),
        lost = summary.count(Outcome::RecordLost),
        filtered = summary.count(Outcome::Filtered),
        identities = summary.count(Outcome::IdentityUpdated),
        ignored = summary.count(Outcome::Ignored),
        config_applied = summary.config_applied,
        config_failed = summary.config_failed,
        malformed = summary.malformed,
        "feed replayed"
    );

    Ok(())
}
