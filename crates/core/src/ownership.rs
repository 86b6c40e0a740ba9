//! Ownership seam.
//!
//! Identity and account management live outside the orchestration core.
//! The core only ever asks one question before triggering a run: does this
//! identity own this scraper?

use async_trait::async_trait;

use crate::slug::Slug;

/// External identity/ownership collaborator.
///
/// Implementations are expected to be cheap to query; the core calls this
/// exactly once per triggered run and never mutates ownership.
#[async_trait]
pub trait OwnershipService: Send + Sync {
    /// Whether `identity` owns the scraper identified by `slug`.
    async fn is_owner(&self, slug: &Slug, identity: &str) -> bool;
}
