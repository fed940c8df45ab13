//! Engine adapter seam - the narrow interface to the sandbox engine.
//!
//! The pool never talks to a container runtime directly. Everything it needs
//! from the engine is expressed through [`EngineAdapter`]: create, destroy,
//! health-check, rename. One implementation exists per backend; the pool
//! itself stays backend-agnostic.

use crate::config::SandboxSpec;
use crate::error::EngineError;
use async_trait::async_trait;
use std::fmt;

/// Engine-side descriptor of one provisioned sandbox.
///
/// Opaque to the pool beyond its identity: the engine id is stable for the
/// sandbox's lifetime, the name is rebound at assignment time via
/// [`EngineAdapter::rename`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineContainer {
    id: String,
    name: String,
}

impl EngineContainer {
    /// Create a descriptor for an engine-side sandbox.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Engine-assigned identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current external name of the sandbox.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

impl fmt::Display for EngineContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Outcome of a health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// The sandbox responded and is usable.
    Healthy,
    /// The sandbox is not usable and should be evicted.
    Unhealthy,
}

/// Narrow interface to the sandbox engine.
///
/// # Contract
///
/// - `create` may take seconds; the pool bounds every call with a timeout
///   and treats a timed-out call as a provisioning failure.
/// - `destroy` must be idempotent: destroying an already-gone sandbox is Ok.
/// - `health_check` must be cheap (sub-second).
/// - `rename` rebinds the sandbox's external identity; the engine id does
///   not change.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Provision a new sandbox from `spec`.
    async fn create(&self, spec: SandboxSpec) -> Result<EngineContainer, EngineError>;

    /// Tear down a sandbox. Idempotent.
    async fn destroy(&self, container: &EngineContainer) -> Result<(), EngineError>;

    /// Probe whether a sandbox is still usable.
    async fn health_check(&self, container: &EngineContainer) -> Result<Health, EngineError>;

    /// Rebind the sandbox's external name.
    async fn rename(&self, container: &EngineContainer, new_name: &str)
        -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_container_display() {
        let c = EngineContainer::new("abc123", "warmbox-pool-1");
        assert_eq!(format!("{}", c), "warmbox-pool-1 (abc123)");
    }

    #[test]
    fn test_engine_container_set_name() {
        let mut c = EngineContainer::new("abc123", "warmbox-pool-1");
        c.set_name("warmbox-session-9");
        assert_eq!(c.name(), "warmbox-session-9");
        assert_eq!(c.id(), "abc123");
    }
}
