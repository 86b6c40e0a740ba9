//! Types and trait for the container runtime seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{BuildError, RuntimeError};

/// A built image, identified by its content id and the tag it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Content identifier reported by the builder (e.g. `sha256:…`).
    pub id: String,
    /// Human-readable tag the image was built under.
    pub tag: String,
}

/// One volume binding from host path to container path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
    pub read_only: bool,
}

impl Mount {
    pub fn read_only(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            read_only: true,
        }
    }

    pub fn read_write(host: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
            read_only: false,
        }
    }

    /// Render as a docker `--volume` argument (`host:container[:ro]`).
    pub fn to_bind_arg(&self) -> String {
        if self.read_only {
            format!("{}:{}:ro", self.host.display(), self.container)
        } else {
            format!("{}:{}", self.host.display(), self.container)
        }
    }
}

/// Everything needed to create one isolated container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Image tag the container runs from.
    pub image: String,
    /// Command and arguments executed inside the container.
    pub command: Vec<String>,
    /// Volume bindings, in order.
    pub mounts: Vec<Mount>,
    /// Runtime-visible container name, for operator diagnosis.
    pub name: String,
}

/// Opaque handle to a created container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
}

/// The five-and-a-bit operations the orchestration core consumes from any
/// container runtime.
///
/// Implementations must be safe to share across concurrently orchestrated
/// scrapers.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Build an image from `context` and tag it `tag`.
    ///
    /// Idempotent: rebuilding with an unchanged context re-points the tag
    /// to the same logical image and never fails because the tag exists.
    /// Containers already running from the old image are unaffected.
    async fn build_image(&self, context: &Path, tag: &str) -> Result<ImageRef, BuildError>;

    /// Re-point `tag` at an existing image.
    async fn tag_image(&self, image: &ImageRef, tag: &str) -> Result<(), BuildError>;

    /// Create (but do not start) a container.
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle, RuntimeError>;

    /// Start a created container.
    async fn start(&self, container: &ContainerHandle) -> Result<(), RuntimeError>;

    /// Follow the container's combined stdout/stderr line-by-line into
    /// `observer` until the container exits; returns the exit code.
    ///
    /// Blocks the calling task for the container's lifetime. Callers that
    /// need cancellation race this future against their cancel signal and
    /// then call [`stop`](Self::stop).
    async fn attach(
        &self,
        container: &ContainerHandle,
        observer: mpsc::Sender<String>,
    ) -> Result<i64, RuntimeError>;

    /// Request a graceful stop, killing after the configured grace period.
    async fn stop(&self, container: &ContainerHandle) -> Result<(), RuntimeError>;

    /// Remove an exited container. Best-effort cleanup.
    async fn remove(&self, container: &ContainerHandle) -> Result<(), RuntimeError>;
}
