//! Run lifecycle states.

/// Where a run currently is in its lifecycle.
///
/// `Pending → Syncing → Starting → Running → Finalizing → {Completed, Failed}`.
/// Any transition before `Running` that errors moves directly to `Failed`,
/// with the ledger entry finalized first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Ledger entry about to be created; nothing has happened yet.
    Pending,
    /// Working copy is being cloned or pulled.
    Syncing,
    /// Container is being created and started.
    Starting,
    /// Attached to the container's output stream, waiting for exit.
    Running,
    /// Container exited (or the run was cancelled); finalizing the ledger.
    Finalizing,
    /// Ledger entry finalized with a terminal outcome.
    Completed,
    /// Orchestration failed; ledger entry finalized as failed.
    Failed,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
