//! Crate-wide error type
//!
//! Each component defines its own narrow error enum at its boundary
//! (`VectorIndexError`, `ClusterError`, `EmbeddingError`, `MemoryStoreError`);
//! this module unifies them for the facade (C9), the only place a caller
//! needs a single `Result` alias.

#[cfg(feature = "cluster-fallback")]
use crate::cluster::ClusterError;
use crate::embeddings::EmbeddingError;
use crate::memory::MemoryStoreError;
use crate::providers::ProviderError;
use crate::vector::VectorIndexError;

/// Unified error type returned by [`crate::manager::MemoryManager`].
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Embedding was the wrong shape or contained non-finite values.
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),

    /// The configured `ChatProvider`/embedding collaborator failed.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The configured `Storage` collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Construction-time misconfiguration (unknown storage type, missing
    /// required fields).
    #[error("config error: {0}")]
    Config(String),

    /// An id lookup missed.
    #[error("not found: {0}")]
    NotFound(String),

    /// The facade was initialized twice.
    #[error("already initialized")]
    AlreadyInitialized,

    #[error(transparent)]
    Vector(#[from] VectorIndexError),

    #[cfg(feature = "cluster-fallback")]
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    MemoryStore(#[from] MemoryStoreError),
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) => Error::ProviderUnavailable(msg),
            ProviderError::Storage(msg) => Error::Storage(msg),
            ProviderError::Config(msg) => Error::Config(msg),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
