//! Read-only query gateway over scraper-produced datasets.
//!
//! A scraper writes whatever schema it likes into a single SQLite file at a
//! well-known path under its data directory. This crate opens that file
//! strictly read-only and runs ad-hoc SQL against it, surfacing values with
//! their natural SQLite types. `query_safe` additionally degrades the
//! expected failure categories (no store yet, corrupt store, bad SQL) to an
//! empty result so callers can treat them as "no data".

pub mod error;
pub mod gateway;
pub mod value;

pub use error::QueryError;
pub use gateway::QueryGateway;
pub use value::{QueryRow, SqlValue};
