use thiserror::Error;

/// Caller-misuse errors reported by the session registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A live session is already registered under this key.
    #[error("session key already registered: {0}")]
    DuplicateKey(String),
}

/// Errors that can arise while reading or writing farm records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Store unreachable or refusing work (used by in-memory fault injection too).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure returned by an event handler. Never surfaces out of `EventBus::publish`.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        HandlerError::Failed(msg.into())
    }
}
