//! Source synchronizer over the `git` command line.
//!
//! Brings a scraper's local working copy up to the origin's current head:
//! a full clone when no working copy exists, an incremental pull otherwise.
//! Both paths are bounded by a configurable timeout and report every
//! failure to the caller; the orchestrator treats any of them as fatal to
//! the run attempt.

pub mod error;
pub mod sync;

pub use error::SyncError;
pub use sync::{GitSynchronizer, SourceSynchronizer, SyncKind};
