//! The run state machine.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use quarry_core::{DockerConfig, OwnershipService, Scraper, StorageLayout};
use quarry_docker::{
    ContainerRuntime, ContainerSpec, ImageBuilder, ImageRef, Mount, RuntimeError,
};
use quarry_git::SourceSynchronizer;
use quarry_ledger::{RunLedger, RunOutcome};

use crate::error::OrchestrationError;
use crate::locks::RunLocks;
use crate::state::RunState;

/// Where the synchronized source tree is mounted inside the container.
const REPO_MOUNT: &str = "/repo";

/// Where the scraper's data directory is mounted inside the container.
const DATA_MOUNT: &str = "/data";

/// Fixed command every scraper container runs.
const RUN_COMMAND: &[&str] = &["/bin/bash", "-l", "-c", "ruby /repo/scraper.rb"];

/// What the caller gets back from a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: i64,
    /// Container exit code; `None` when the run was cancelled before exit.
    pub exit_code: Option<i64>,
    pub outcome: RunOutcome,
}

/// How the container phase of a run ended.
enum ContainerExit {
    Code(i64),
    Cancelled,
}

/// Orchestrates isolated scraper runs.
///
/// Shareable across tasks; runs on different scrapers proceed concurrently
/// while runs on the same scraper are serialized by [`RunLocks`].
pub struct Orchestrator {
    sync: Arc<dyn SourceSynchronizer>,
    runtime: Arc<dyn ContainerRuntime>,
    ledger: Arc<dyn RunLedger>,
    builder: ImageBuilder,
    layout: StorageLayout,
    locks: RunLocks,
}

impl Orchestrator {
    pub fn new(
        sync: Arc<dyn SourceSynchronizer>,
        runtime: Arc<dyn ContainerRuntime>,
        ledger: Arc<dyn RunLedger>,
        layout: StorageLayout,
        docker: DockerConfig,
    ) -> Self {
        let builder = ImageBuilder::new(Arc::clone(&runtime), docker);
        Self {
            sync,
            runtime,
            ledger,
            builder,
            layout,
            locks: RunLocks::new(),
        }
    }

    /// Run locks, exposed so collaborators can ask whether a scraper is
    /// currently being orchestrated.
    pub fn locks(&self) -> &RunLocks {
        &self.locks
    }

    /// Gate a run behind the ownership check, then execute it.
    pub async fn trigger(
        &self,
        scraper: &Scraper,
        identity: &str,
        ownership: &dyn OwnershipService,
        observer: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<RunReport, OrchestrationError> {
        if !ownership.is_owner(scraper.slug(), identity).await {
            return Err(OrchestrationError::NotOwner {
                slug: scraper.slug().to_string(),
                identity: identity.to_string(),
            });
        }
        self.go(scraper, observer, cancel).await
    }

    /// Execute one run of `scraper`, streaming container output lines to
    /// `observer`.
    ///
    /// The ledger entry is created before any fallible work so that a
    /// crash mid-run is always observable as an open entry. Every failure
    /// path before the container runs finalizes the entry as failed;
    /// cancellation stops the container and finalizes it as interrupted.
    pub async fn go(
        &self,
        scraper: &Scraper,
        observer: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<RunReport, OrchestrationError> {
        let slug = scraper.slug();
        let _guard = self
            .locks
            .acquire(slug)
            .ok_or_else(|| OrchestrationError::AlreadyRunning(slug.to_string()))?;

        let started_at = Utc::now();
        let run_id = self.ledger.create_run(slug, started_at).await?;
        tracing::info!(scraper = %slug, run_id, state = %RunState::Syncing, "Run started");

        match self.execute(scraper, observer, &cancel).await {
            Ok(exit) => {
                tracing::info!(scraper = %slug, run_id, state = %RunState::Finalizing, "Container finished");
                let (outcome, exit_code) = match exit {
                    ContainerExit::Code(0) => (RunOutcome::Succeeded, Some(0)),
                    ContainerExit::Code(code) => (RunOutcome::Failed, Some(code)),
                    ContainerExit::Cancelled => (RunOutcome::Interrupted, None),
                };
                self.ledger.finish_run(run_id, Utc::now(), outcome).await?;
                tracing::info!(
                    scraper = %slug,
                    run_id,
                    outcome = outcome.as_str(),
                    state = %RunState::Completed,
                    "Run finalized"
                );
                Ok(RunReport {
                    run_id,
                    exit_code,
                    outcome,
                })
            }
            Err(e) => {
                // Finalize so no entry is left permanently open by a
                // pre-container failure. If the attach stream broke, the
                // true outcome is unknown; failed is the honest default.
                if let Err(ledger_err) = self
                    .ledger
                    .finish_run(run_id, Utc::now(), RunOutcome::Failed)
                    .await
                {
                    tracing::error!(
                        scraper = %slug,
                        run_id,
                        error = %ledger_err,
                        "Could not finalize run entry; it will appear open"
                    );
                }
                tracing::warn!(scraper = %slug, run_id, error = %e, state = %RunState::Failed, "Run failed");
                Err(e)
            }
        }
    }

    /// Sync, prepare, launch, and wait. Errors here leave the ledger entry
    /// open; [`go`](Self::go) owns finalization.
    async fn execute(
        &self,
        scraper: &Scraper,
        observer: mpsc::Sender<String>,
        cancel: &CancellationToken,
    ) -> Result<ContainerExit, OrchestrationError> {
        let slug = scraper.slug();

        self.sync.synchronize(scraper, &self.layout).await?;

        let data_path = self.layout.data_path(slug);
        tokio::fs::create_dir_all(&data_path)
            .await
            .map_err(|e| OrchestrationError::CreateFailed(RuntimeError::Io(e)))?;

        tracing::info!(scraper = %slug, state = %RunState::Starting, "Preparing container");
        let image = self.builder.ensure_image_built().await?;
        let spec = self.container_spec(scraper, &image);
        let container = self
            .runtime
            .create(&spec)
            .await
            .map_err(OrchestrationError::CreateFailed)?;
        self.runtime
            .start(&container)
            .await
            .map_err(OrchestrationError::CreateFailed)?;

        tracing::info!(
            scraper = %slug,
            container = %container.id,
            state = %RunState::Running,
            "Running docker container"
        );

        let exit = tokio::select! {
            res = self.runtime.attach(&container, observer) => {
                ContainerExit::Code(res.map_err(OrchestrationError::AttachLost)?)
            }
            _ = cancel.cancelled() => {
                tracing::warn!(scraper = %slug, container = %container.id, "Run cancelled; stopping container");
                if let Err(e) = self.runtime.stop(&container).await {
                    tracing::error!(container = %container.id, error = %e, "Could not stop container on cancel");
                }
                ContainerExit::Cancelled
            }
        };

        if let Err(e) = self.runtime.remove(&container).await {
            tracing::debug!(container = %container.id, error = %e, "Container cleanup failed");
        }

        Ok(exit)
    }

    /// Container spec for one run: shared image, fixed entry command, the
    /// working copy mounted read-only and the data directory read-write.
    fn container_spec(&self, scraper: &Scraper, image: &ImageRef) -> ContainerSpec {
        let slug = scraper.slug();
        ContainerSpec {
            image: image.tag.clone(),
            command: RUN_COMMAND.iter().map(|s| s.to_string()).collect(),
            mounts: vec![
                Mount::read_only(self.layout.repo_path(slug), REPO_MOUNT),
                Mount::read_write(self.layout.data_path(slug), DATA_MOUNT),
            ],
            name: format!("quarry-{}-{}", slug, uuid::Uuid::new_v4().simple()),
        }
    }
}
