//! Error types for the dispatchq library.

/// Result type alias for dispatchq operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or running an execution pool.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Executor error (worker thread lifecycle)
    #[error("executor error: {0}")]
    Executor(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create an executor error
    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }
}
