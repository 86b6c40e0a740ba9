//! Execution orchestrator: the state machine at the center of the system.
//!
//! Given a scraper, the orchestrator creates an open run ledger entry,
//! synchronizes the working copy, launches an isolated container with the
//! source mounted read-only and the data directory mounted read-write,
//! streams container output to an observer, and finalizes the ledger entry
//! when the container exits (or earlier, when orchestration fails before
//! it starts). Per-scraper run locks serialize attempts on the same
//! scraper; different scrapers run concurrently.

pub mod error;
pub mod locks;
pub mod orchestrator;
pub mod state;

pub use error::OrchestrationError;
pub use locks::{RunLockGuard, RunLocks};
pub use orchestrator::{Orchestrator, RunReport};
pub use state::RunState;
