//! Clone/pull logic and git failure classification.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use quarry_core::{GitConfig, Scraper, StorageLayout};

use crate::error::SyncError;

/// Which operation a successful synchronization performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// No working copy existed; a full clone was performed.
    Cloned,
    /// The existing working copy was brought to the origin's head.
    Pulled,
}

/// Seam the orchestrator synchronizes source through.
#[async_trait]
pub trait SourceSynchronizer: Send + Sync {
    /// Create or update the scraper's working copy from its origin.
    ///
    /// Idempotent: repeated calls with no upstream change succeed and
    /// leave the working copy untouched.
    async fn synchronize(
        &self,
        scraper: &Scraper,
        layout: &StorageLayout,
    ) -> Result<SyncKind, SyncError>;
}

/// [`SourceSynchronizer`] backed by the `git` binary.
pub struct GitSynchronizer {
    config: GitConfig,
}

impl GitSynchronizer {
    pub fn new(config: GitConfig) -> Self {
        Self { config }
    }

    /// Run one git invocation under the configured timeout.
    ///
    /// `kill_on_drop(true)` ensures a timed-out git process does not
    /// linger and keep mutating the working copy.
    async fn run_git(&self, args: &[&str]) -> Result<(), SyncError> {
        let start = Instant::now();
        let mut cmd = Command::new("git");
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.config.timeout, cmd.output())
            .await
            .map_err(|_| SyncError::SyncTimeout {
                elapsed_secs: start.elapsed().as_secs(),
            })?
            .map_err(SyncError::local)?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            Err(classify_git_failure(&stderr))
        }
    }
}

#[async_trait]
impl SourceSynchronizer for GitSynchronizer {
    async fn synchronize(
        &self,
        scraper: &Scraper,
        layout: &StorageLayout,
    ) -> Result<SyncKind, SyncError> {
        let repo_path = layout.repo_path(scraper.slug());

        if working_copy_exists(&repo_path).await? {
            tracing::info!(
                scraper = %scraper.slug(),
                path = %repo_path.display(),
                "Pulling git repo"
            );
            self.run_git(&[
                "-C",
                &repo_path.to_string_lossy(),
                "pull",
                "--ff-only",
            ])
            .await?;
            Ok(SyncKind::Pulled)
        } else {
            tracing::info!(
                scraper = %scraper.slug(),
                url = %scraper.git_url,
                "Cloning git repo"
            );
            tokio::fs::create_dir_all(layout.repos_root())
                .await
                .map_err(SyncError::local)?;
            self.run_git(&[
                "clone",
                &scraper.git_url,
                &repo_path.to_string_lossy(),
            ])
            .await?;
            Ok(SyncKind::Cloned)
        }
    }
}

/// A path is a working copy when it contains a `.git` directory.
async fn working_copy_exists(repo_path: &Path) -> Result<bool, SyncError> {
    match tokio::fs::metadata(repo_path.join(".git")).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SyncError::local(e)),
    }
}

/// Map a failed git invocation's stderr to the error taxonomy.
///
/// Filesystem phrases indicate the local side refused the write; anything
/// else is attributed to the origin (unresolvable host, refused connection,
/// missing repository, authentication).
fn classify_git_failure(stderr: &str) -> SyncError {
    const LOCAL_PHRASES: &[&str] = &[
        "permission denied",
        "read-only file system",
        "no space left on device",
        "could not create work tree",
        "could not create directory",
        "unable to create file",
    ];

    let lowered = stderr.to_lowercase();
    if LOCAL_PHRASES.iter().any(|p| lowered.contains(p)) {
        SyncError::LocalWriteError {
            detail: stderr.trim().to_string(),
        }
    } else {
        SyncError::OriginUnreachable {
            stderr: stderr.trim().to_string(),
        }
    }
}
