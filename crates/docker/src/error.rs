/// Errors from container-level operations (create, start, attach, stop).
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The docker daemon could not be reached.
    #[error("docker daemon unreachable: {0}")]
    DaemonUnreachable(String),

    /// The docker command ran but reported failure.
    #[error("docker command failed: {stderr}")]
    CommandFailed { stderr: String },

    /// Spawning or communicating with the docker binary failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from building or tagging the shared execution image.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The build context directory is missing or unusable.
    #[error("build context error: {0}")]
    ContextError(String),

    /// The docker daemon could not be reached.
    #[error("docker daemon unreachable: {0}")]
    RuntimeUnreachable(String),

    /// The build failed for lack of disk, memory, or similar.
    #[error("resource exhaustion during build: {0}")]
    ResourceExhausted(String),

    /// The build exceeded its extended timeout and was killed. The
    /// previously tagged image, if any, is left as it was.
    #[error("image build timed out after {elapsed_secs}s")]
    BuildTimeout { elapsed_secs: u64 },
}

/// Phrases docker emits when the daemon is down or the socket is absent.
pub(crate) fn daemon_unreachable(stderr: &str) -> bool {
    let lowered = stderr.to_lowercase();
    lowered.contains("cannot connect to the docker daemon")
        || lowered.contains("is the docker daemon running")
        || lowered.contains("error during connect")
}

/// Phrases indicating the host ran out of a resource mid-operation.
pub(crate) fn resource_exhausted(stderr: &str) -> bool {
    let lowered = stderr.to_lowercase();
    lowered.contains("no space left on device") || lowered.contains("cannot allocate memory")
}
