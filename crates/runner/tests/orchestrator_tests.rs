//! Integration tests for the run orchestrator.
//!
//! Exercises the full state machine against fake source-control and
//! container-runtime collaborators and a real in-memory SQLite ledger:
//! mounts, observer streaming, exit-code mapping, pre-container failure
//! finalization, the per-scraper run lock, and cancellation.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use quarry_core::{DockerConfig, OwnershipService, Scraper, Slug, StorageLayout};
use quarry_docker::{
    BuildError, ContainerHandle, ContainerRuntime, ContainerSpec, ImageRef, Mount, RuntimeError,
};
use quarry_git::{SourceSynchronizer, SyncError, SyncKind};
use quarry_ledger::{RunLedger, RunOutcome, SqliteRunLedger};
use quarry_runner::{Orchestrator, OrchestrationError};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Source synchronizer that records calls and optionally fails.
struct FakeSync {
    fail: bool,
    calls: AtomicU32,
}

impl FakeSync {
    fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicU32::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl SourceSynchronizer for FakeSync {
    async fn synchronize(
        &self,
        _scraper: &Scraper,
        _layout: &StorageLayout,
    ) -> Result<SyncKind, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(SyncError::OriginUnreachable {
                stderr: "could not resolve host: example.org".to_string(),
            })
        } else {
            Ok(SyncKind::Cloned)
        }
    }
}

/// How the fake runtime's `attach` behaves.
enum AttachMode {
    /// Emit the lines, then exit with the given code.
    Exit(i64),
    /// Emit the lines, wait for the gate, then exit with the given code.
    GatedExit(i64),
    /// Emit the lines, then block forever (until the caller cancels).
    Hang,
}

/// Container runtime that records every call.
struct FakeRuntime {
    mode: AttachMode,
    lines: Vec<String>,
    gate: Semaphore,
    created: Mutex<Vec<ContainerSpec>>,
    started: Mutex<Vec<String>>,
    stopped: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
    fail_create: bool,
}

impl FakeRuntime {
    fn exiting(code: i64, lines: &[&str]) -> Self {
        Self::with_mode(AttachMode::Exit(code), lines)
    }

    fn with_mode(mode: AttachMode, lines: &[&str]) -> Self {
        Self {
            mode,
            lines: lines.iter().map(|s| s.to_string()).collect(),
            gate: Semaphore::new(0),
            created: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            fail_create: false,
        }
    }

    fn failing_create() -> Self {
        let mut rt = Self::exiting(0, &[]);
        rt.fail_create = true;
        rt
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn build_image(&self, _context: &Path, tag: &str) -> Result<ImageRef, BuildError> {
        Ok(ImageRef {
            id: "sha256:cafe".to_string(),
            tag: tag.to_string(),
        })
    }

    async fn tag_image(&self, _image: &ImageRef, _tag: &str) -> Result<(), BuildError> {
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle, RuntimeError> {
        if self.fail_create {
            return Err(RuntimeError::CommandFailed {
                stderr: "no such image".to_string(),
            });
        }
        self.created.lock().unwrap().push(spec.clone());
        Ok(ContainerHandle {
            id: format!("container-{}", self.created.lock().unwrap().len()),
        })
    }

    async fn start(&self, container: &ContainerHandle) -> Result<(), RuntimeError> {
        self.started.lock().unwrap().push(container.id.clone());
        Ok(())
    }

    async fn attach(
        &self,
        _container: &ContainerHandle,
        observer: mpsc::Sender<String>,
    ) -> Result<i64, RuntimeError> {
        for line in &self.lines {
            let _ = observer.send(line.clone()).await;
        }
        match self.mode {
            AttachMode::Exit(code) => Ok(code),
            AttachMode::GatedExit(code) => {
                let permit = self.gate.acquire().await.expect("gate closed");
                permit.forget();
                Ok(code)
            }
            AttachMode::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn stop(&self, container: &ContainerHandle) -> Result<(), RuntimeError> {
        self.stopped.lock().unwrap().push(container.id.clone());
        Ok(())
    }

    async fn remove(&self, container: &ContainerHandle) -> Result<(), RuntimeError> {
        self.removed.lock().unwrap().push(container.id.clone());
        Ok(())
    }
}

struct FixedOwnership {
    owner: &'static str,
}

#[async_trait]
impl OwnershipService for FixedOwnership {
    async fn is_owner(&self, _slug: &Slug, identity: &str) -> bool {
        identity == self.owner
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    _dir: tempfile::TempDir,
    layout: StorageLayout,
    sync: Arc<FakeSync>,
    runtime: Arc<FakeRuntime>,
    ledger: Arc<SqliteRunLedger>,
    orchestrator: Arc<Orchestrator>,
}

impl Harness {
    async fn new(sync: FakeSync, runtime: FakeRuntime) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        quarry_ledger::init(&pool).await.unwrap();

        let sync = Arc::new(sync);
        let runtime = Arc::new(runtime);
        let ledger = Arc::new(SqliteRunLedger::new(pool));
        let docker = DockerConfig {
            build_context: dir.path().to_path_buf(),
            ..DockerConfig::default()
        };
        let orchestrator = Arc::new(Orchestrator::new(
            sync.clone(),
            runtime.clone(),
            ledger.clone(),
            layout.clone(),
            docker,
        ));

        Self {
            _dir: dir,
            layout,
            sync,
            runtime,
            ledger,
            orchestrator,
        }
    }

    fn scraper(&self) -> Scraper {
        Scraper::new("My Scraper", "https://example.org/my-scraper.git").unwrap()
    }
}

fn observer() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completed_run_mounts_streams_and_finalizes() {
    let h = Harness::new(FakeSync::ok(), FakeRuntime::exiting(0, &["hello", "world"])).await;
    let scraper = h.scraper();
    let (tx, mut rx) = observer();

    let report = h
        .orchestrator
        .go(&scraper, tx, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert_eq!(report.exit_code, Some(0));

    // Source was synchronized exactly once.
    assert_eq!(h.sync.calls.load(Ordering::SeqCst), 1);

    // The container got the shared image, the fixed command, and the two
    // volume bindings: working copy read-only, data dir read-write.
    let created = h.runtime.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    let spec = &created[0];
    assert_eq!(spec.image, "quarry-scraper");
    assert_eq!(spec.command.last().unwrap(), "ruby /repo/scraper.rb");
    assert_eq!(
        spec.mounts,
        vec![
            Mount::read_only(h.layout.repo_path(scraper.slug()), "/repo"),
            Mount::read_write(h.layout.data_path(scraper.slug()), "/data"),
        ]
    );

    // Data dir was created; container was started and cleaned up.
    assert!(h.layout.data_path(scraper.slug()).is_dir());
    assert_eq!(h.runtime.started.lock().unwrap().len(), 1);
    assert_eq!(h.runtime.removed.lock().unwrap().len(), 1);

    // Output lines reached the observer in order.
    assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    assert_eq!(rx.recv().await.as_deref(), Some("world"));

    // Ledger entry is finalized with finished_at strictly after started_at.
    let run = h
        .ledger
        .last_completed_run(scraper.slug())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.id, report.run_id);
    assert_eq!(run.outcome(), Some(RunOutcome::Succeeded));
    assert!(run.finished_at.unwrap() > run.started_at);
}

#[tokio::test]
async fn nonzero_exit_code_is_a_failed_outcome() {
    let h = Harness::new(FakeSync::ok(), FakeRuntime::exiting(3, &["boom"])).await;
    let scraper = h.scraper();
    let (tx, _rx) = observer();

    let report = h
        .orchestrator
        .go(&scraper, tx, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.exit_code, Some(3));

    let run = h
        .ledger
        .last_completed_run(scraper.slug())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.outcome(), Some(RunOutcome::Failed));
}

#[tokio::test]
async fn sync_failure_finalizes_the_entry_before_any_container_work() {
    let h = Harness::new(FakeSync::failing(), FakeRuntime::exiting(0, &[])).await;
    let scraper = h.scraper();
    let (tx, _rx) = observer();

    let err = h
        .orchestrator
        .go(&scraper, tx, CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(err, OrchestrationError::SyncFailed(_));

    // No container was ever created.
    assert!(h.runtime.created.lock().unwrap().is_empty());

    // The entry is not left open: finalized as failed.
    assert!(h.ledger.open_runs(scraper.slug()).await.unwrap().is_empty());
    let run = h
        .ledger
        .last_completed_run(scraper.slug())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.outcome(), Some(RunOutcome::Failed));
}

#[tokio::test]
async fn create_failure_finalizes_the_entry() {
    let h = Harness::new(FakeSync::ok(), FakeRuntime::failing_create()).await;
    let scraper = h.scraper();
    let (tx, _rx) = observer();

    let err = h
        .orchestrator
        .go(&scraper, tx, CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(err, OrchestrationError::CreateFailed(_));
    assert!(h.ledger.open_runs(scraper.slug()).await.unwrap().is_empty());
}

#[tokio::test]
async fn second_run_on_same_scraper_is_rejected_while_first_is_active() {
    let h = Harness::new(
        FakeSync::ok(),
        FakeRuntime::with_mode(AttachMode::GatedExit(0), &[]),
    )
    .await;
    let scraper = h.scraper();

    let (tx, _rx1) = observer();
    let first = {
        let orchestrator = h.orchestrator.clone();
        let scraper = scraper.clone();
        tokio::spawn(async move { orchestrator.go(&scraper, tx, CancellationToken::new()).await })
    };

    // Wait until the first run holds the lock.
    while !h.orchestrator.locks().is_active(scraper.slug()) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // The entry is observable as open while the run is in flight.
    assert_eq!(h.ledger.open_runs(scraper.slug()).await.unwrap().len(), 1);

    let (tx2, _rx2) = observer();
    let err = h
        .orchestrator
        .go(&scraper, tx2, CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(err, OrchestrationError::AlreadyRunning(_));

    // Release the first run and let it finish cleanly.
    h.runtime.gate.add_permits(1);
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.outcome, RunOutcome::Succeeded);

    // Exactly one container was created across both attempts, and exactly
    // one ledger entry exists.
    assert_eq!(h.runtime.created.lock().unwrap().len(), 1);
    assert!(h.ledger.open_runs(scraper.slug()).await.unwrap().is_empty());
}

#[tokio::test]
async fn lock_is_released_after_a_run_completes() {
    let h = Harness::new(FakeSync::ok(), FakeRuntime::exiting(0, &[])).await;
    let scraper = h.scraper();

    let (tx, _rx) = observer();
    h.orchestrator
        .go(&scraper, tx, CancellationToken::new())
        .await
        .unwrap();

    let (tx2, _rx2) = observer();
    let report = h
        .orchestrator
        .go(&scraper, tx2, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::Succeeded);
}

#[tokio::test]
async fn cancellation_stops_the_container_and_marks_interrupted() {
    let h = Harness::new(
        FakeSync::ok(),
        FakeRuntime::with_mode(AttachMode::Hang, &["partial output"]),
    )
    .await;
    let scraper = h.scraper();
    let cancel = CancellationToken::new();

    let (tx, mut rx) = observer();
    let run = {
        let orchestrator = h.orchestrator.clone();
        let scraper = scraper.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.go(&scraper, tx, cancel).await })
    };

    // Wait for the run to reach the container phase, then cancel.
    assert_eq!(rx.recv().await.as_deref(), Some("partial output"));
    cancel.cancel();

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(report.exit_code, None);

    // The container was asked to stop, and the entry is finalized.
    assert_eq!(h.runtime.stopped.lock().unwrap().len(), 1);
    let run = h
        .ledger
        .last_completed_run(scraper.slug())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.outcome(), Some(RunOutcome::Interrupted));
}

#[tokio::test]
async fn trigger_rejects_a_non_owner_without_touching_the_ledger() {
    let h = Harness::new(FakeSync::ok(), FakeRuntime::exiting(0, &[])).await;
    let scraper = h.scraper();
    let ownership = FixedOwnership { owner: "alice" };

    let (tx, _rx) = observer();
    let err = h
        .orchestrator
        .trigger(&scraper, "mallory", &ownership, tx, CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(err, OrchestrationError::NotOwner { .. });

    assert!(h.ledger.open_runs(scraper.slug()).await.unwrap().is_empty());
    assert!(h
        .ledger
        .last_completed_run(scraper.slug())
        .await
        .unwrap()
        .is_none());
    assert_eq!(h.sync.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn trigger_allows_the_owner() {
    let h = Harness::new(FakeSync::ok(), FakeRuntime::exiting(0, &[])).await;
    let scraper = h.scraper();
    let ownership = FixedOwnership { owner: "alice" };

    let (tx, _rx) = observer();
    let report = h
        .orchestrator
        .trigger(&scraper, "alice", &ownership, tx, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::Succeeded);
}

#[tokio::test]
async fn different_scrapers_run_concurrently() {
    let h = Harness::new(
        FakeSync::ok(),
        FakeRuntime::with_mode(AttachMode::GatedExit(0), &[]),
    )
    .await;
    let a = Scraper::new("Scraper A", "https://example.org/a.git").unwrap();
    let b = Scraper::new("Scraper B", "https://example.org/b.git").unwrap();

    let (tx_a, _rx_a) = observer();
    let first = {
        let orchestrator = h.orchestrator.clone();
        let a = a.clone();
        tokio::spawn(async move { orchestrator.go(&a, tx_a, CancellationToken::new()).await })
    };
    while !h.orchestrator.locks().is_active(a.slug()) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (tx_b, _rx_b) = observer();
    let second = {
        let orchestrator = h.orchestrator.clone();
        let b = b.clone();
        tokio::spawn(async move { orchestrator.go(&b, tx_b, CancellationToken::new()).await })
    };
    while !h.orchestrator.locks().is_active(b.slug()) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Both runs are simultaneously in flight; release them.
    h.runtime.gate.add_permits(2);
    assert_eq!(
        first.await.unwrap().unwrap().outcome,
        RunOutcome::Succeeded
    );
    assert_eq!(
        second.await.unwrap().unwrap().outcome,
        RunOutcome::Succeeded
    );
}
