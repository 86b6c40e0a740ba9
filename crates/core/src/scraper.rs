//! Scraper entity and the deterministic on-disk storage layout.
//!
//! Every scraper owns two filesystem subtrees derived purely from its slug:
//! a git working copy under `<root>/repos/<slug>` and a data directory under
//! `<root>/data/<slug>`. The produced dataset is a single SQLite file at a
//! well-known name inside the data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::slug::Slug;

/// Well-known filename of the dataset a scraper writes inside its data
/// directory.
pub const DATASET_FILE: &str = "scraperwiki.sqlite";

/// A versioned unit of user-supplied extraction code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scraper {
    /// Immutable identity, assigned at creation.
    slug: Slug,
    /// Human-readable display name. May change; the slug never follows it.
    pub full_name: String,
    /// Remote origin the working copy is synchronized from.
    pub git_url: String,
}

impl Scraper {
    /// Create a scraper, deriving its slug from `full_name` once.
    pub fn new(full_name: impl Into<String>, git_url: impl Into<String>) -> Result<Self, CoreError> {
        let full_name = full_name.into();
        let slug = Slug::from_full_name(&full_name)?;
        Ok(Self {
            slug,
            full_name,
            git_url: git_url.into(),
        })
    }

    /// Rehydrate a scraper whose slug was assigned previously.
    ///
    /// Used when loading from storage; the slug is trusted as-is and is
    /// not re-derived from `full_name`.
    pub fn with_slug(
        slug: Slug,
        full_name: impl Into<String>,
        git_url: impl Into<String>,
    ) -> Self {
        Self {
            slug,
            full_name: full_name.into(),
            git_url: git_url.into(),
        }
    }

    pub fn slug(&self) -> &Slug {
        &self.slug
    }

    /// Remove the working copy and data directory from disk.
    ///
    /// Idempotent: missing paths are not an error. Must only be called when
    /// no run is in flight for this scraper.
    pub async fn destroy_repo_and_data(&self, layout: &StorageLayout) -> Result<(), CoreError> {
        for path in [layout.repo_path(&self.slug), layout.data_path(&self.slug)] {
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "Removed scraper directory");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Root of the scraper storage tree.
///
/// Path resolution is a pure function of the slug; calling any accessor
/// twice yields identical values.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding all working copies.
    pub fn repos_root(&self) -> PathBuf {
        self.root.join("repos")
    }

    /// Directory holding all scraper data directories.
    pub fn data_root(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Working copy of one scraper's source.
    pub fn repo_path(&self, slug: &Slug) -> PathBuf {
        self.repos_root().join(slug.as_str())
    }

    /// Read-write data directory mounted into one scraper's container.
    pub fn data_path(&self, slug: &Slug) -> PathBuf {
        self.data_root().join(slug.as_str())
    }

    /// The SQLite dataset file a scraper produces.
    pub fn dataset_path(&self, slug: &Slug) -> PathBuf {
        self.data_path(slug).join(DATASET_FILE)
    }
}
