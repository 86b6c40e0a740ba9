//! Operator binary: orchestrate one scraper run end to end.
//!
//! Usage: `quarry-runner "<full name>" <git url>`
//!
//! Container output is printed to stdout line-by-line as the run streams
//! it; Ctrl-C requests cancellation, which stops the container and
//! finalizes the run as interrupted.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quarry_core::{DockerConfig, GitConfig, Scraper, StorageLayout};
use quarry_docker::DockerCli;
use quarry_git::GitSynchronizer;
use quarry_ledger::SqliteRunLedger;
use quarry_runner::Orchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quarry_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let (full_name, git_url) = match (args.next(), args.next()) {
        (Some(name), Some(url)) => (name, url),
        _ => anyhow::bail!("usage: quarry-runner \"<full name>\" <git url>"),
    };
    let scraper = Scraper::new(full_name, git_url)?;

    let layout = StorageLayout::new(
        std::env::var("QUARRY_ROOT").unwrap_or_else(|_| "db/scrapers".to_string()),
    );
    let ledger_path =
        std::env::var("QUARRY_LEDGER_PATH").unwrap_or_else(|_| "db/quarry.sqlite".to_string());
    if let Some(parent) = Path::new(&ledger_path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let pool = quarry_ledger::connect(Path::new(&ledger_path)).await?;
    quarry_ledger::init(&pool).await?;

    let docker_config = DockerConfig::from_env();
    let orchestrator = Orchestrator::new(
        Arc::new(GitSynchronizer::new(GitConfig::from_env())),
        Arc::new(DockerCli::new(docker_config.clone())),
        Arc::new(SqliteRunLedger::new(pool)),
        layout,
        docker_config,
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received; cancelling run");
                cancel.cancel();
            }
        });
    }

    let (tx, mut rx) = mpsc::channel::<String>(256);
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            println!("{line}");
        }
    });

    let report = orchestrator.go(&scraper, tx, cancel).await?;
    printer.await.ok();

    tracing::info!(
        run_id = report.run_id,
        outcome = report.outcome.as_str(),
        exit_code = ?report.exit_code,
        "Run complete"
    );
    Ok(())
}
