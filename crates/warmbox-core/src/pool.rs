//! Warm container pool for reducing session cold-start latency.
//!
//! Provisioning a fresh isolated sandbox takes seconds to tens of seconds;
//! the pool keeps a small number of fully-initialized idle sandboxes ready
//! so new sessions attach almost instantly.
//!
//! # Architecture
//!
//! A background maintenance task runs on a fixed period: it evicts handles
//! that fail their health check, computes the deficit against the target
//! size, and fills it in a bounded batch, creating strictly sequentially and
//! stopping the batch on the first failure. A stateful backoff gate keeps a
//! struggling engine from being hit with proactive creations at all.
//!
//! Acquisition takes the oldest idle handle and rebinds its name to the
//! session, or falls back to one synchronous creation when the pool is
//! empty. Sessions never return sandboxes to the pool; released sandboxes
//! are destroyed, so session state cannot leak between tenants.
//!
//! # Example
//!
//! ```ignore
//! use warmbox_core::{ContainerPool, PoolConfig, SessionSpec};
//!
//! let mut pool = ContainerPool::new(PoolConfig::default(), engine);
//! pool.start(); // Spawn the maintenance task and pre-populate
//!
//! let handle = pool.acquire(SessionSpec::new("session-1")).await?;
//! // ... run the session ...
//! pool.release(&"session-1".into()).await?;
//!
//! pool.shutdown().await?;
//! ```

use crate::backoff::BackoffController;
use crate::config::{PoolConfig, SandboxSpec};
use crate::engine::{EngineAdapter, EngineContainer, Health};
use crate::error::{EngineError, PoolError, Result};
use crate::handle::{ContainerHandle, HandleState, PoolId, SessionId, SessionSpec};
use crate::state::{PoolCounts, PoolState};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Deadline for cheap engine calls (destroy, health-check, rename).
/// `create` uses the configured `create_timeout` instead.
const ENGINE_OP_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Statistics
// ============================================================================

/// Pool statistics for observability.
///
/// All counters are atomic and can be read without locking.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Acquisitions served instantly from the warm pool.
    pub warm_hits: AtomicU64,
    /// Acquisitions that fell back to on-demand creation.
    pub cold_misses: AtomicU64,
    /// Total sandboxes created (pool fill and cold path).
    pub created: AtomicU64,
    /// Total sandboxes destroyed by the pool.
    pub destroyed: AtomicU64,
    /// Sandboxes evicted after a failed health check.
    pub evicted: AtomicU64,
}

impl PoolStats {
    /// Get the number of warm hits.
    pub fn warm_hits(&self) -> u64 {
        self.warm_hits.load(Ordering::Relaxed)
    }

    /// Get the number of cold misses.
    pub fn cold_misses(&self) -> u64 {
        self.cold_misses.load(Ordering::Relaxed)
    }

    /// Get the total sandboxes created.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Get the total sandboxes destroyed.
    pub fn destroyed(&self) -> u64 {
        self.destroyed.load(Ordering::Relaxed)
    }

    /// Get the number of health-check evictions.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Calculate the warm hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.warm_hits() as f64;
        let misses = self.cold_misses() as f64;
        let total = hits + misses;
        if total == 0.0 {
            0.0
        } else {
            (hits / total) * 100.0
        }
    }
}

// ============================================================================
// Shared core
// ============================================================================

/// State shared between the pool front door and the maintenance task.
struct PoolShared {
    config: PoolConfig,
    engine: Arc<dyn EngineAdapter>,
    state: PoolState,
    backoff: BackoffController,
    stats: PoolStats,
    /// Ephemeral session assignments; lost on restart by design.
    sessions: Mutex<HashMap<SessionId, EngineContainer>>,
    shutdown: AtomicBool,
    shutdown_notify: Notify,
}

impl PoolShared {
    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, EngineContainer>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One maintenance cycle: evict unhealthy handles, then fill the deficit
    /// in a bounded, strictly sequential batch.
    async fn run_cycle(&self) {
        self.evict_unhealthy().await;

        let counts = self.state.counts();
        let deficit = self.config.target_size.saturating_sub(counts.available());
        if deficit == 0 {
            return;
        }

        if !self.backoff.permit_attempt() {
            tracing::debug!(
                deficit,
                consecutive_failures = self.backoff.consecutive_failures(),
                "Skipping pool fill (backoff window active)"
            );
            return;
        }

        let to_create = deficit.min(self.config.batch_limit);
        tracing::info!(deficit, to_create, "Pool fill starting");

        // Sequential on purpose: a struggling engine must never see a burst
        // of parallel creations, and the first failure stops the batch.
        let mut filled = 0usize;
        for _ in 0..to_create {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            let pool_id = PoolId::new();
            let name = format!("{}-pool-{}", self.config.name_prefix, pool_id);
            let spec = self.config.template.named(name);

            self.state.begin_provisioning();
            let created = self.create_bounded(spec).await;
            self.state.end_provisioning();

            match created {
                Ok(container) => {
                    let handle = ContainerHandle::new(pool_id, container);
                    tracing::info!(
                        pool_id = %pool_id,
                        container = %handle.container(),
                        "Created pooled sandbox"
                    );
                    self.state.insert(handle);
                    self.backoff.record_success();
                    self.stats.created.fetch_add(1, Ordering::Relaxed);
                    filled += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Pooled sandbox creation failed, stopping batch");
                    self.backoff.record_failure();
                    break;
                }
            }
        }

        tracing::info!(
            filled,
            idle = self.state.idle_len(),
            "Pool fill finished"
        );
    }

    /// Health-check every idle handle and tear down the failures.
    ///
    /// Best-effort: destroy errors are logged and not retried within the
    /// cycle.
    async fn evict_unhealthy(&self) {
        let mut evicted = Vec::new();
        for (pool_id, container) in self.state.snapshot_idle() {
            if self.check_health(&container).await {
                self.state.record_health_pass(pool_id, Utc::now());
                continue;
            }

            // The handle may have been taken by an acquire meanwhile; only
            // evict if it is still idle.
            if self.state.mark_unhealthy(pool_id) {
                tracing::warn!(pool_id = %pool_id, container = %container, "Evicting unhealthy sandbox");
                self.stats.evicted.fetch_add(1, Ordering::Relaxed);
                evicted.push(pool_id);
            }
        }

        for pool_id in evicted {
            if let Some(mut handle) = self.state.remove(pool_id) {
                handle.set_state(HandleState::Destroying);
                self.destroy_best_effort(handle.container()).await;
            }
        }
    }

    async fn check_health(&self, container: &EngineContainer) -> bool {
        match tokio::time::timeout(ENGINE_OP_TIMEOUT, self.engine.health_check(container)).await {
            Ok(Ok(Health::Healthy)) => true,
            Ok(Ok(Health::Unhealthy)) => false,
            Ok(Err(e)) => {
                tracing::debug!(container = %container, error = %e, "Health check errored");
                false
            }
            Err(_) => {
                tracing::debug!(container = %container, "Health check timed out");
                false
            }
        }
    }

    /// Call engine `create` bounded by the configured timeout.
    ///
    /// A timed-out call counts as a provisioning failure; if it resolves
    /// later anyway, a reaper task destroys the orphaned sandbox instead of
    /// leaking it.
    async fn create_bounded(&self, spec: SandboxSpec) -> std::result::Result<EngineContainer, EngineError> {
        let engine = Arc::clone(&self.engine);
        let mut task = tokio::spawn(async move { engine.create(spec).await });

        match tokio::time::timeout(self.config.create_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(EngineError::Provision(format!(
                "create task failed: {join_err}"
            ))),
            Err(_) => {
                let engine = Arc::clone(&self.engine);
                tokio::spawn(async move {
                    if let Ok(Ok(container)) = task.await {
                        tracing::warn!(
                            container = %container,
                            "Reaping sandbox from timed-out create"
                        );
                        if let Err(e) = engine.destroy(&container).await {
                            tracing::error!(container = %container, error = %e, "Failed to reap orphaned sandbox");
                        }
                    }
                });
                Err(EngineError::Timeout(self.config.create_timeout))
            }
        }
    }

    async fn destroy_best_effort(&self, container: &EngineContainer) {
        match tokio::time::timeout(ENGINE_OP_TIMEOUT, self.engine.destroy(container)).await {
            Ok(Ok(())) => {
                self.stats.destroyed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                tracing::warn!(container = %container, error = %e, "Failed to destroy sandbox");
            }
            Err(_) => {
                tracing::warn!(container = %container, "Destroy timed out");
            }
        }
    }
}

// ============================================================================
// Pool
// ============================================================================

/// A pool of pre-provisioned sandboxes with a background maintenance task.
///
/// # Thread Safety
///
/// `acquire` and `release` take `&self` and are safe to call from any number
/// of tasks concurrently; no lock is held across an engine call. `start` and
/// `shutdown` take `&mut self` and belong to the owning lifecycle.
pub struct ContainerPool {
    shared: Arc<PoolShared>,
    maintenance_handle: Option<JoinHandle<()>>,
}

impl ContainerPool {
    /// Create a new pool over the given engine adapter.
    ///
    /// The pool is created cold; call [`start()`](Self::start) to spawn the
    /// maintenance task and pre-populate.
    pub fn new(config: PoolConfig, engine: Arc<dyn EngineAdapter>) -> Self {
        tracing::info!(
            target_size = config.target_size,
            batch_limit = config.batch_limit,
            maintenance_interval = ?config.maintenance_interval,
            "Creating container pool"
        );

        let backoff = BackoffController::new(config.backoff_window, config.quick_fail_threshold);
        Self {
            shared: Arc::new(PoolShared {
                backoff,
                engine,
                state: PoolState::new(),
                stats: PoolStats::default(),
                sessions: Mutex::new(HashMap::new()),
                shutdown: AtomicBool::new(false),
                shutdown_notify: Notify::new(),
                config,
            }),
            maintenance_handle: None,
        }
    }

    /// Start the background maintenance task.
    ///
    /// Runs one fill cycle immediately, then repeats on the configured
    /// interval. With `target_size == 0` pooling is disabled and no task is
    /// spawned; acquisition always provisions on demand.
    pub fn start(&mut self) {
        if self.shared.config.target_size == 0 {
            tracing::info!("Container pool disabled (target_size = 0)");
            return;
        }
        if self.maintenance_handle.is_some() {
            tracing::warn!("Pool maintenance already started");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            Self::maintenance_loop(shared).await;
        });

        self.maintenance_handle = Some(handle);
        tracing::info!(
            target_size = self.shared.config.target_size,
            "Pool maintenance started"
        );
    }

    /// Background maintenance loop.
    ///
    /// Runs until shutdown is signaled. The first cycle runs immediately so
    /// the pool is pre-populated without waiting a full interval.
    async fn maintenance_loop(shared: Arc<PoolShared>) {
        tracing::debug!("Maintenance loop started");
        shared.run_cycle().await;

        loop {
            tokio::select! {
                biased;

                // Priority: shutdown signal.
                _ = shared.shutdown_notify.notified() => {
                    tracing::info!("Maintenance loop received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(shared.config.maintenance_interval) => {
                    // Double-check the flag; the notify may have fired while
                    // a previous cycle was running.
                    if shared.shutdown.load(Ordering::Relaxed) {
                        tracing::debug!("Maintenance loop detected shutdown flag");
                        break;
                    }
                    shared.run_cycle().await;
                }
            }
        }

        tracing::debug!("Maintenance loop exited");
    }

    /// Acquire a sandbox for a session.
    ///
    /// Takes the oldest idle handle from the pool and renames it to the
    /// session (latency is just the rename cost). When the pool is empty,
    /// falls back to one synchronous creation bound to the session directly.
    ///
    /// # Errors
    ///
    /// [`PoolError::ResourceExhausted`] when the pool is empty and the
    /// on-demand creation fails, or was quick-failed after repeated engine
    /// failures. The caller should retry later.
    pub async fn acquire(&self, session: SessionSpec) -> Result<ContainerHandle> {
        let shared = &self.shared;
        let session_name = format!("{}-{}", shared.config.name_prefix, session.id);

        while let Some(mut handle) = shared.state.try_take_idle() {
            let renamed = tokio::time::timeout(
                ENGINE_OP_TIMEOUT,
                shared.engine.rename(handle.container(), &session_name),
            )
            .await;

            match renamed {
                Ok(Ok(())) => {
                    handle.set_container_name(&session_name);
                    shared
                        .sessions()
                        .insert(session.id.clone(), handle.container().clone());
                    shared.stats.warm_hits.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        session_id = %session.id,
                        pool_id = %handle.id(),
                        idle = shared.state.idle_len(),
                        "Acquired sandbox from warm pool"
                    );
                    return Ok(handle);
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        pool_id = %handle.id(),
                        error = %e,
                        "Rename failed, discarding pooled sandbox"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        pool_id = %handle.id(),
                        "Rename timed out, discarding pooled sandbox"
                    );
                }
            }

            // The sandbox has an engine-side problem; it never goes back to
            // the pool. Tear it down and try the next idle handle.
            shared.destroy_best_effort(handle.container()).await;
        }

        // Cold path: provision on demand, bound to the session directly.
        if shared.backoff.quick_fail() {
            tracing::warn!(
                session_id = %session.id,
                consecutive_failures = shared.backoff.consecutive_failures(),
                "Quick-failing on-demand creation"
            );
            return Err(PoolError::ResourceExhausted);
        }

        shared.stats.cold_misses.fetch_add(1, Ordering::Relaxed);
        tracing::info!(session_id = %session.id, "Pool empty, provisioning on demand");
        let spec = shared.config.template.named(&session_name);
        match shared.create_bounded(spec).await {
            Ok(container) => {
                shared.backoff.record_success();
                shared.stats.created.fetch_add(1, Ordering::Relaxed);
                let mut handle = ContainerHandle::new(PoolId::new(), container);
                handle.set_state(HandleState::Reserved);
                shared
                    .sessions()
                    .insert(session.id.clone(), handle.container().clone());
                tracing::info!(
                    session_id = %session.id,
                    pool_id = %handle.id(),
                    "Provisioned sandbox on demand"
                );
                Ok(handle)
            }
            Err(e) => {
                shared.backoff.record_failure();
                tracing::warn!(session_id = %session.id, error = %e, "On-demand creation failed");
                Err(PoolError::ResourceExhausted)
            }
        }
    }

    /// Release a session's sandbox, destroying it.
    ///
    /// Sandboxes are never returned to the shared pool after a session used
    /// them; reuse applies only to never-assigned capacity.
    ///
    /// # Errors
    ///
    /// [`PoolError::UnknownSession`] if the session has no recorded
    /// assignment. Destroy failures are logged, not surfaced: the engine's
    /// destroy is idempotent and the assignment is already gone.
    pub async fn release(&self, session_id: &SessionId) -> Result<()> {
        let container = self
            .shared
            .sessions()
            .remove(session_id)
            .ok_or_else(|| PoolError::UnknownSession(session_id.clone()))?;

        tracing::info!(session_id = %session_id, container = %container, "Releasing session sandbox");
        self.shared.destroy_best_effort(&container).await;
        Ok(())
    }

    /// Get the current number of idle sandboxes.
    pub fn idle_len(&self) -> usize {
        self.shared.state.idle_len()
    }

    /// Get per-state handle counts.
    pub fn counts(&self) -> PoolCounts {
        self.shared.state.counts()
    }

    /// Get the pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Get the pool statistics.
    pub fn stats(&self) -> &PoolStats {
        &self.shared.stats
    }

    /// Check if the maintenance task is running.
    pub fn is_running(&self) -> bool {
        self.maintenance_handle.is_some() && !self.shared.shutdown.load(Ordering::Relaxed)
    }

    /// Gracefully shut down the pool.
    ///
    /// Stops the maintenance task (awaiting any cycle in flight, so no
    /// provisioning is abandoned mid-call), then destroys every handle the
    /// pool still owns. Reserved handles are session-owned and are left to
    /// their normal session-end teardown.
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down container pool");

        self.shared.shutdown.store(true, Ordering::Relaxed);
        self.shared.shutdown_notify.notify_one();

        if let Some(handle) = self.maintenance_handle.take() {
            tracing::debug!("Waiting for maintenance task to complete");
            if let Err(e) = handle.await {
                tracing::error!(error = ?e, "Maintenance task panicked during shutdown");
            }
        }

        let handles = self.shared.state.drain_for_shutdown();
        let count = handles.len();
        tracing::info!(count, "Destroying pooled sandboxes");

        for handle in handles {
            self.shared.destroy_best_effort(handle.container()).await;
        }

        tracing::info!(
            destroyed = count,
            warm_hits = self.shared.stats.warm_hits(),
            cold_misses = self.shared.stats.cold_misses(),
            hit_rate = format!("{:.1}%", self.shared.stats.hit_rate()),
            "Pool shutdown complete"
        );

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
