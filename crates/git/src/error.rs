/// Errors that can occur while synchronizing a working copy.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The remote origin could not be reached or does not exist.
    #[error("origin unreachable: {stderr}")]
    OriginUnreachable { stderr: String },

    /// The local filesystem refused the write (permissions, disk full,
    /// unreadable path).
    #[error("local write failure: {detail}")]
    LocalWriteError { detail: String },

    /// The clone or pull exceeded its configured timeout and was killed.
    #[error("git operation timed out after {elapsed_secs}s")]
    SyncTimeout { elapsed_secs: u64 },
}

impl SyncError {
    pub(crate) fn local(e: std::io::Error) -> Self {
        Self::LocalWriteError {
            detail: e.to_string(),
        }
    }
}
