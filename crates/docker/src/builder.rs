//! Shared execution image policy.
//!
//! All scrapers run inside one image built from a fixed, versioned context
//! directory. The build is long-running and idempotent: re-invoking it
//! re-points the well-known tag without disturbing containers still running
//! from the previous image.

use std::sync::Arc;

use quarry_core::DockerConfig;

use crate::error::BuildError;
use crate::runtime::{ContainerRuntime, ImageRef};

/// Builds (lazily or on demand) the shared execution image.
pub struct ImageBuilder {
    runtime: Arc<dyn ContainerRuntime>,
    config: DockerConfig,
}

impl ImageBuilder {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: DockerConfig) -> Self {
        Self { runtime, config }
    }

    /// Tag the shared execution image is published under.
    pub fn image_tag(&self) -> &str {
        &self.config.image_tag
    }

    /// Build the shared execution image and tag it with the well-known name.
    ///
    /// Safe to call repeatedly: an unchanged context re-tags the same
    /// logical image. The tag operation is atomic from the caller's
    /// perspective: on any failure the previous tag is left as it was.
    pub async fn ensure_image_built(&self) -> Result<ImageRef, BuildError> {
        let context = &self.config.build_context;
        match tokio::fs::metadata(context).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(BuildError::ContextError(format!(
                    "build context is not a directory: {}",
                    context.display()
                )))
            }
            Err(e) => {
                return Err(BuildError::ContextError(format!(
                    "build context unreadable at {}: {e}",
                    context.display()
                )))
            }
        }

        self.runtime
            .build_image(context, &self.config.image_tag)
            .await
    }
}
