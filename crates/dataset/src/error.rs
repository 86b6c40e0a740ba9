/// Errors from querying a scraper's dataset.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// No dataset file exists yet (the scraper has never run, or never
    /// wrote output).
    #[error("dataset not found at {path}")]
    StoreAbsent { path: String },

    /// A file exists but is not a readable SQLite database.
    #[error("dataset is not a valid store: {detail}")]
    StoreCorrupt { detail: String },

    /// The SQL failed to prepare or execute (syntax error, unknown table
    /// or column).
    #[error("malformed query: {message}")]
    MalformedQuery { message: String },

    /// Anything else: permissions, resource exhaustion, driver failures.
    /// Never swallowed by `query_safe`.
    #[error("query failure: {0}")]
    Other(#[from] sqlx::Error),
}
