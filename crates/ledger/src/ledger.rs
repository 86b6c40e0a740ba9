//! [`RunLedger`] trait and its SQLite implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use quarry_core::Slug;

use crate::model::{Run, RunOutcome};

/// Column list for `runs` queries.
const COLUMNS: &str = "id, scraper_slug, started_at, finished_at, outcome";

/// External run ledger collaborator.
///
/// The orchestrator is the only component that appends and finalizes
/// entries; query methods are read-only.
#[async_trait]
pub trait RunLedger: Send + Sync {
    /// Append an open entry for a run beginning now. Returns the run id.
    async fn create_run(
        &self,
        slug: &Slug,
        started_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error>;

    /// Finalize an entry. Called exactly once per run.
    async fn finish_run(
        &self,
        run_id: i64,
        finished_at: DateTime<Utc>,
        outcome: RunOutcome,
    ) -> Result<(), sqlx::Error>;

    /// Most recent *completed* run for a scraper.
    ///
    /// Open entries are excluded: "last run" is ill-defined over runs that
    /// never finished.
    async fn last_completed_run(&self, slug: &Slug) -> Result<Option<Run>, sqlx::Error>;

    /// Entries with no `finished_at`: in flight, or crashed if no
    /// orchestrator is alive for them.
    async fn open_runs(&self, slug: &Slug) -> Result<Vec<Run>, sqlx::Error>;

    /// Start time of the most recent completed run, if any.
    async fn last_run_at(&self, slug: &Slug) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        Ok(self.last_completed_run(slug).await?.map(|r| r.started_at))
    }
}

/// [`RunLedger`] backed by a sqlx SQLite pool.
pub struct SqliteRunLedger {
    pool: SqlitePool,
}

impl SqliteRunLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunLedger for SqliteRunLedger {
    async fn create_run(
        &self,
        slug: &Slug,
        started_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO runs (scraper_slug, started_at) VALUES ($1, $2) RETURNING id",
        )
        .bind(slug.as_str())
        .bind(started_at)
        .fetch_one(&self.pool)
        .await?;
        tracing::debug!(scraper = %slug, run_id = row.0, "Created run entry");
        Ok(row.0)
    }

    async fn finish_run(
        &self,
        run_id: i64,
        finished_at: DateTime<Utc>,
        outcome: RunOutcome,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE runs SET finished_at = $2, outcome = $3 WHERE id = $1")
            .bind(run_id)
            .bind(finished_at)
            .bind(outcome.as_str())
            .execute(&self.pool)
            .await?;
        tracing::debug!(run_id, outcome = outcome.as_str(), "Finalized run entry");
        Ok(())
    }

    async fn last_completed_run(&self, slug: &Slug) -> Result<Option<Run>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM runs \
             WHERE scraper_slug = $1 AND finished_at IS NOT NULL \
             ORDER BY started_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Run>(&query)
            .bind(slug.as_str())
            .fetch_optional(&self.pool)
            .await
    }

    async fn open_runs(&self, slug: &Slug) -> Result<Vec<Run>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM runs \
             WHERE scraper_slug = $1 AND finished_at IS NULL \
             ORDER BY started_at ASC"
        );
        sqlx::query_as::<_, Run>(&query)
            .bind(slug.as_str())
            .fetch_all(&self.pool)
            .await
    }
}
