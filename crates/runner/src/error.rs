use quarry_docker::{BuildError, RuntimeError};
use quarry_git::SyncError;

/// Errors from orchestrating a run.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// A run is already in flight for this scraper; re-running would race
    /// on the same working copy and data paths.
    #[error("a run is already in flight for scraper '{0}'")]
    AlreadyRunning(String),

    /// The triggering identity does not own the scraper.
    #[error("identity '{identity}' does not own scraper '{slug}'")]
    NotOwner { slug: String, identity: String },

    /// Source synchronization failed; the run never reached the container.
    #[error("source synchronization failed: {0}")]
    SyncFailed(#[from] SyncError),

    /// The shared execution image could not be built or found.
    #[error("image build failed: {0}")]
    BuildFailed(#[from] BuildError),

    /// Container creation or start failed.
    #[error("container creation failed: {0}")]
    CreateFailed(RuntimeError),

    /// The attach stream broke while the container was running. The run's
    /// true outcome is unknown; the ledger entry is finalized as failed.
    #[error("attach stream lost: {0}")]
    AttachLost(RuntimeError),

    /// The run ledger refused an append or finalization.
    #[error("run ledger failure: {0}")]
    Ledger(#[from] sqlx::Error),
}
