//! Run ledger: the append-only record of run attempts.
//!
//! Each run entry is created the instant orchestration begins and finalized
//! exactly once when the container exits or orchestration fails before it
//! starts. An entry with `finished_at = NULL` whose owning process is gone
//! is a crashed run; [`RunLedger::open_runs`] makes that state observable.

pub mod ledger;
pub mod model;

pub use ledger::{RunLedger, SqliteRunLedger};
pub use model::{Run, RunOutcome};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Open (creating if missing) the ledger database at `path`.
pub async fn connect(path: &std::path::Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePoolOptions::new().connect_with(options).await
}

/// Create the `runs` table if it does not exist. Idempotent.
pub async fn init(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS runs ( \
             id INTEGER PRIMARY KEY AUTOINCREMENT, \
             scraper_slug TEXT NOT NULL, \
             started_at TEXT NOT NULL, \
             finished_at TEXT, \
             outcome TEXT \
         )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_runs_slug_started \
         ON runs (scraper_slug, started_at DESC)",
    )
    .execute(pool)
    .await?;
    Ok(())
}
