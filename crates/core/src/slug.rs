//! Scraper slug derivation and validation.
//!
//! A [`Slug`] is the stable identity of a scraper. It is derived from the
//! human-readable full name exactly once, at creation, and never recomputed:
//! working-copy and data paths hang off the slug, so a silent re-derivation
//! on rename would strand an existing scraper's files.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum length of a slug.
const MAX_SLUG_LEN: usize = 128;

/// Immutable, filesystem-safe scraper identity.
///
/// Always lowercase, containing only `a-z`, `0-9`, and single interior
/// hyphens. Construct with [`Slug::from_full_name`] (derivation) or
/// [`Slug::parse`] (an already-assigned slug, e.g. loaded from storage).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Derive a slug from a human-readable full name.
    ///
    /// Lowercases the name, maps every run of non-alphanumeric characters
    /// to a single hyphen, and trims leading/trailing hyphens.
    pub fn from_full_name(full_name: &str) -> Result<Self, CoreError> {
        let mut out = String::with_capacity(full_name.len());
        let mut pending_hyphen = false;

        for c in full_name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
        }

        Self::parse(&out)
    }

    /// Accept an already-derived slug, validating its shape.
    pub fn parse(slug: &str) -> Result<Self, CoreError> {
        if slug.is_empty() {
            return Err(CoreError::Validation(
                "Slug must not be empty".to_string(),
            ));
        }
        if slug.len() > MAX_SLUG_LEN {
            return Err(CoreError::Validation(format!(
                "Slug must not exceed {MAX_SLUG_LEN} characters"
            )));
        }
        if !slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(CoreError::Validation(format!(
                "Slug may only contain lowercase alphanumerics and hyphens, got: '{slug}'"
            )));
        }
        if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
            return Err(CoreError::Validation(format!(
                "Slug must not have leading, trailing, or doubled hyphens, got: '{slug}'"
            )));
        }
        Ok(Self(slug.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
