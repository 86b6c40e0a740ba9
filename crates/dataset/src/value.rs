//! Typed values decoded from a scraper dataset.

use serde::Serialize;

/// One SQLite value surfaced with its natural semantic type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One result row: column names paired with decoded values, preserving the
/// statement's column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRow {
    pub columns: Vec<(String, SqlValue)>,
}

impl QueryRow {
    /// Value of the first column with the given name, if present.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, v)| v)
    }
}
