//! Core domain types for the quarry orchestration platform.
//!
//! Holds scraper identity (slugs), the deterministic storage layout,
//! boundary configuration, and the ownership seam. Zero internal
//! dependencies; every other workspace crate builds on this one.

pub mod config;
pub mod error;
pub mod ownership;
pub mod scraper;
pub mod slug;

pub use config::{DockerConfig, GitConfig};
pub use error::CoreError;
pub use ownership::OwnershipService;
pub use scraper::{Scraper, StorageLayout};
pub use slug::Slug;
