//! Boundary configuration.
//!
//! The original deployment configured git and docker through process-wide
//! mutable settings. Here every timeout and name is an explicit value
//! carried by a config struct and passed into the component constructors.

use std::path::PathBuf;
use std::time::Duration;

/// Default bound on a clone or pull.
const DEFAULT_GIT_TIMEOUT_SECS: u64 = 60;

/// Default bound on an image build. Building the shared runtime image from
/// scratch routinely takes many minutes.
const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 30 * 60;

/// Default grace period given to a container on stop before it is killed.
const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

/// Configuration for the source synchronizer.
#[derive(Debug, Clone)]
pub struct GitConfig {
    /// Maximum wall-clock time for a single clone or pull.
    pub timeout: Duration,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_GIT_TIMEOUT_SECS),
        }
    }
}

impl GitConfig {
    /// Read overrides from the environment (`QUARRY_GIT_TIMEOUT_SECS`),
    /// falling back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        Self {
            timeout: env_secs("QUARRY_GIT_TIMEOUT_SECS", DEFAULT_GIT_TIMEOUT_SECS),
        }
    }
}

/// Configuration for the container runtime boundary.
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Tag of the shared execution image all scrapers run inside.
    pub image_tag: String,
    /// Build context directory for the shared execution image.
    pub build_context: PathBuf,
    /// Maximum wall-clock time for an image build.
    pub build_timeout: Duration,
    /// Grace period a container gets on stop before being killed.
    pub stop_timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            image_tag: "quarry-scraper".to_string(),
            build_context: PathBuf::from("lib/build-image"),
            build_timeout: Duration::from_secs(DEFAULT_BUILD_TIMEOUT_SECS),
            stop_timeout: Duration::from_secs(DEFAULT_STOP_TIMEOUT_SECS),
        }
    }
}

impl DockerConfig {
    /// Read overrides from the environment (`QUARRY_IMAGE_TAG`,
    /// `QUARRY_BUILD_CONTEXT`, `QUARRY_BUILD_TIMEOUT_SECS`,
    /// `QUARRY_STOP_TIMEOUT_SECS`), falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            image_tag: std::env::var("QUARRY_IMAGE_TAG").unwrap_or(defaults.image_tag),
            build_context: std::env::var("QUARRY_BUILD_CONTEXT")
                .map(PathBuf::from)
                .unwrap_or(defaults.build_context),
            build_timeout: env_secs("QUARRY_BUILD_TIMEOUT_SECS", DEFAULT_BUILD_TIMEOUT_SECS),
            stop_timeout: env_secs("QUARRY_STOP_TIMEOUT_SECS", DEFAULT_STOP_TIMEOUT_SECS),
        }
    }
}

/// Read a duration in whole seconds from an environment variable.
fn env_secs(var: &str, default_secs: u64) -> Duration {
    let secs = std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}
