//! Error types for warmbox-core.

use crate::handle::SessionId;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for warmbox-core operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors reported by the engine adapter.
///
/// These never escape to callers of [`acquire`](crate::ContainerPool::acquire);
/// the pool folds them into backoff state and surfaces
/// [`PoolError::ResourceExhausted`] instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine failed to provision a sandbox.
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// A health probe could not be completed.
    #[error("health check failed: {0}")]
    HealthCheck(String),

    /// Renaming a sandbox to its session identity failed.
    #[error("rename failed: {0}")]
    Rename(String),

    /// Tearing down a sandbox failed.
    #[error("destroy failed: {0}")]
    Destroy(String),

    /// An engine call did not complete within its deadline.
    #[error("engine call timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors surfaced by the pool to the session-orchestration layer.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No idle sandbox was available and on-demand provisioning failed
    /// (or was quick-failed after repeated engine failures).
    #[error("could not provision execution environment, retry later")]
    ResourceExhausted,

    /// `release` was called for a session the pool never assigned
    /// (or one that was already released).
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// Error from the engine adapter.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
