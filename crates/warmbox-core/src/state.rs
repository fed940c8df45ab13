//! Concurrency-safe record of every handle the pool owns.
//!
//! All mutations go through one short-held lock; the guard is synchronous,
//! so it cannot be held across an engine call. Idle handles keep FIFO order:
//! insertion order equals creation order, and `try_take_idle` always returns
//! the oldest handle first to bound staleness.

use crate::engine::EngineContainer;
use crate::handle::{ContainerHandle, HandleState, PoolId};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Per-state handle counts, for deficit computation and introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCounts {
    /// Handles ready for assignment.
    pub idle: usize,
    /// Creations currently in flight.
    pub provisioning: usize,
    /// Handles awaiting teardown.
    pub unhealthy: usize,
}

impl PoolCounts {
    /// Handles that count against the target size.
    pub fn available(&self) -> usize {
        self.idle + self.provisioning
    }
}

#[derive(Default)]
struct Shelf {
    /// Idle handles, oldest first.
    idle: VecDeque<ContainerHandle>,
    /// Evicted handles waiting for destroy.
    unhealthy: Vec<ContainerHandle>,
    /// In-flight creation count.
    provisioning: usize,
}

/// The set of all pool-owned handles.
pub(crate) struct PoolState {
    inner: Mutex<Shelf>,
}

impl PoolState {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Shelf::default()),
        }
    }

    /// Every mutation is a single in-memory update, so a poisoned lock
    /// still holds a consistent shelf; recover it instead of propagating.
    fn shelf(&self) -> MutexGuard<'_, Shelf> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Atomically take the oldest Idle handle, marking it Reserved.
    ///
    /// Empty pool is not an error, just `None`. No two calls can return the
    /// same handle.
    pub(crate) fn try_take_idle(&self) -> Option<ContainerHandle> {
        let mut shelf = self.shelf();
        let mut handle = shelf.idle.pop_front()?;
        handle.set_state(HandleState::Reserved);
        Some(handle)
    }

    /// Shelve a successfully created handle as Idle.
    pub(crate) fn insert(&self, mut handle: ContainerHandle) {
        handle.set_state(HandleState::Idle);
        self.shelf().idle.push_back(handle);
    }

    /// Move an Idle handle to the unhealthy shelf.
    ///
    /// Returns false if the handle is no longer Idle (e.g. taken by a
    /// concurrent acquire between the health check and this call).
    pub(crate) fn mark_unhealthy(&self, pool_id: PoolId) -> bool {
        let mut shelf = self.shelf();
        let Some(pos) = shelf.idle.iter().position(|h| h.id() == pool_id) else {
            return false;
        };
        // remove() on a VecDeque preserves the order of the rest.
        if let Some(mut handle) = shelf.idle.remove(pos) {
            handle.set_state(HandleState::Unhealthy);
            shelf.unhealthy.push(handle);
            true
        } else {
            false
        }
    }

    /// Remove a handle from the pool entirely, whatever shelf it is on.
    pub(crate) fn remove(&self, pool_id: PoolId) -> Option<ContainerHandle> {
        let mut shelf = self.shelf();
        if let Some(pos) = shelf.idle.iter().position(|h| h.id() == pool_id) {
            return shelf.idle.remove(pos);
        }
        if let Some(pos) = shelf.unhealthy.iter().position(|h| h.id() == pool_id) {
            return Some(shelf.unhealthy.remove(pos));
        }
        None
    }

    /// Record a passed health check on an Idle handle.
    pub(crate) fn record_health_pass(&self, pool_id: PoolId, at: DateTime<Utc>) {
        let mut shelf = self.shelf();
        if let Some(handle) = shelf.idle.iter_mut().find(|h| h.id() == pool_id) {
            handle.record_health_pass(at);
        }
    }

    /// Snapshot (id, container) of every Idle handle, for health checks run
    /// outside the lock.
    pub(crate) fn snapshot_idle(&self) -> Vec<(PoolId, EngineContainer)> {
        self.shelf()
            .idle
            .iter()
            .map(|h| (h.id(), h.container().clone()))
            .collect()
    }

    /// Bracket an in-flight creation so it counts against the deficit.
    pub(crate) fn begin_provisioning(&self) {
        self.shelf().provisioning += 1;
    }

    pub(crate) fn end_provisioning(&self) {
        let mut shelf = self.shelf();
        shelf.provisioning = shelf.provisioning.saturating_sub(1);
    }

    pub(crate) fn counts(&self) -> PoolCounts {
        let shelf = self.shelf();
        PoolCounts {
            idle: shelf.idle.len(),
            provisioning: shelf.provisioning,
            unhealthy: shelf.unhealthy.len(),
        }
    }

    pub(crate) fn idle_len(&self) -> usize {
        self.shelf().idle.len()
    }

    /// Take every pool-owned handle for shutdown teardown.
    ///
    /// Reserved handles are session-owned and never appear here.
    pub(crate) fn drain_for_shutdown(&self) -> Vec<ContainerHandle> {
        let mut shelf = self.shelf();
        let mut handles: Vec<ContainerHandle> = shelf.idle.drain(..).collect();
        handles.append(&mut shelf.unhealthy);
        for handle in &mut handles {
            handle.set_state(HandleState::Destroying);
        }
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str) -> ContainerHandle {
        ContainerHandle::new(PoolId::new(), EngineContainer::new(name, name))
    }

    #[test]
    fn test_take_from_empty_is_none() {
        let state = PoolState::new();
        assert!(state.try_take_idle().is_none());
    }

    #[test]
    fn test_take_oldest_first() {
        let state = PoolState::new();
        let first = handle("c1");
        let first_id = first.id();
        state.insert(first);
        state.insert(handle("c2"));

        let taken = state.try_take_idle().unwrap();
        assert_eq!(taken.id(), first_id);
        assert_eq!(taken.state(), HandleState::Reserved);
        assert_eq!(state.idle_len(), 1);
    }

    #[test]
    fn test_insert_sets_idle() {
        let state = PoolState::new();
        state.insert(handle("c1"));
        let taken = state.try_take_idle().unwrap();
        // Reserved on take, so verify via counts instead
        assert_eq!(taken.container().id(), "c1");
        assert_eq!(state.counts().idle, 0);
    }

    #[test]
    fn test_mark_unhealthy_moves_shelf() {
        let state = PoolState::new();
        let h = handle("c1");
        let id = h.id();
        state.insert(h);

        assert!(state.mark_unhealthy(id));
        let counts = state.counts();
        assert_eq!(counts.idle, 0);
        assert_eq!(counts.unhealthy, 1);

        // Unhealthy handles are never returned by acquisition.
        assert!(state.try_take_idle().is_none());

        let removed = state.remove(id).unwrap();
        assert_eq!(removed.state(), HandleState::Unhealthy);
        assert_eq!(state.counts().unhealthy, 0);
    }

    #[test]
    fn test_mark_unhealthy_missing_handle() {
        let state = PoolState::new();
        assert!(!state.mark_unhealthy(PoolId::new()));
    }

    #[test]
    fn test_provisioning_bracket() {
        let state = PoolState::new();
        state.begin_provisioning();
        state.begin_provisioning();
        assert_eq!(state.counts().provisioning, 2);
        assert_eq!(state.counts().available(), 2);
        state.end_provisioning();
        state.end_provisioning();
        assert_eq!(state.counts().provisioning, 0);
    }

    #[test]
    fn test_record_health_pass() {
        let state = PoolState::new();
        let h = handle("c1");
        let id = h.id();
        state.insert(h);

        let now = Utc::now();
        state.record_health_pass(id, now);
        let taken = state.try_take_idle().unwrap();
        assert_eq!(taken.last_health_check_at(), Some(now));
    }

    #[test]
    fn test_drain_for_shutdown_covers_both_shelves() {
        let state = PoolState::new();
        let sick = handle("sick");
        let sick_id = sick.id();
        state.insert(sick);
        state.insert(handle("ok"));
        state.mark_unhealthy(sick_id);

        let drained = state.drain_for_shutdown();
        assert_eq!(drained.len(), 2);
        assert!(drained.iter().all(|h| h.state() == HandleState::Destroying));
        let counts = state.counts();
        assert_eq!((counts.idle, counts.unhealthy), (0, 0));
    }

    #[test]
    fn test_remove_from_either_shelf() {
        let state = PoolState::new();
        let a = handle("a");
        let b = handle("b");
        let (a_id, b_id) = (a.id(), b.id());
        state.insert(a);
        state.insert(b);
        state.mark_unhealthy(b_id);

        assert!(state.remove(a_id).is_some());
        assert!(state.remove(b_id).is_some());
        assert!(state.remove(b_id).is_none());
    }
}
