//! Run row model and outcome mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a finalized run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Container exited with code zero.
    Succeeded,
    /// Container exited non-zero, or orchestration failed before it started.
    Failed,
    /// The run was cancelled and the container stopped on request.
    Interrupted,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

/// One timed attempt to execute a scraper.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Run {
    pub id: i64,
    pub scraper_slug: String,
    pub started_at: DateTime<Utc>,
    /// `None` while in progress, or permanently for a run whose owning
    /// process crashed strictly inside the running state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Stored as text; `None` until the run is finalized.
    outcome: Option<String>,
}

impl Run {
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome.as_deref().and_then(RunOutcome::parse)
    }

    /// A run is complete once `finished_at` is populated.
    pub fn is_completed(&self) -> bool {
        self.finished_at.is_some()
    }
}
