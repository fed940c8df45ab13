//! Handle and session identity types.

use crate::engine::EngineContainer;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a pool-owned handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(Uuid);

impl PoolId {
    /// Create a new random pool ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PoolId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a handle.
///
/// State moves one way: `Provisioning -> Idle -> Reserved` on the happy path,
/// `Idle -> Unhealthy -> Destroying` on eviction. A Reserved handle never
/// returns to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Creation is in flight; owned by the creating task.
    Provisioning,
    /// Ready for assignment, owned by the pool.
    Idle,
    /// Assigned to a session; the pool has relinquished ownership.
    Reserved,
    /// Failed a health check, awaiting teardown.
    Unhealthy,
    /// Teardown in progress.
    Destroying,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisioning => write!(f, "Provisioning"),
            Self::Idle => write!(f, "Idle"),
            Self::Reserved => write!(f, "Reserved"),
            Self::Unhealthy => write!(f, "Unhealthy"),
            Self::Destroying => write!(f, "Destroying"),
        }
    }
}

/// One pool-owned sandbox: engine-side descriptor plus pool bookkeeping.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    pool_id: PoolId,
    container: EngineContainer,
    state: HandleState,
    created_at: DateTime<Utc>,
    last_health_check_at: Option<DateTime<Utc>>,
}

impl ContainerHandle {
    /// Wrap a freshly created engine sandbox.
    ///
    /// The handle starts in `Provisioning`; inserting it into the pool moves
    /// it to `Idle`.
    pub(crate) fn new(pool_id: PoolId, container: EngineContainer) -> Self {
        Self {
            pool_id,
            container,
            state: HandleState::Provisioning,
            created_at: Utc::now(),
            last_health_check_at: None,
        }
    }

    /// Get the pool-side identifier.
    pub fn id(&self) -> PoolId {
        self.pool_id
    }

    /// Get the engine-side descriptor.
    pub fn container(&self) -> &EngineContainer {
        &self.container
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Get the creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Timestamp of the last passed health check, if any.
    pub fn last_health_check_at(&self) -> Option<DateTime<Utc>> {
        self.last_health_check_at
    }

    pub(crate) fn set_state(&mut self, state: HandleState) {
        self.state = state;
    }

    pub(crate) fn record_health_pass(&mut self, at: DateTime<Utc>) {
        self.last_health_check_at = Some(at);
    }

    pub(crate) fn set_container_name(&mut self, name: impl Into<String>) {
        self.container.set_name(name);
    }
}

/// Identifier of a session assigned by the orchestration layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Per-session parameters passed to [`acquire`](crate::ContainerPool::acquire).
#[derive(Debug, Clone)]
pub struct SessionSpec {
    /// The session requesting a sandbox.
    pub id: SessionId,
}

impl SessionSpec {
    /// Create a spec for the given session.
    pub fn new(id: impl Into<SessionId>) -> Self {
        Self { id: id.into() }
    }
}
