use thiserror::Error;

/// Rejected configuration. Not retried; the call site has to be fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("delay must be greater than or equal to 0, got {0}ms")]
    NegativeDelay(i64),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
