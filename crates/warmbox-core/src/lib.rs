//! # warmbox-core
//!
//! Warm sandbox pool manager for multi-tenant agent-execution backends.
//!
//! Provisioning a fresh isolated execution environment on demand is slow
//! (seconds to tens of seconds). This crate keeps a small number of
//! fully-initialized idle sandboxes ready so new sessions attach almost
//! instantly, while a failure/backoff controller prevents a struggling
//! engine from triggering uncontrolled resource growth.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     warmbox-core                          │
//! ├───────────────────────────────────────────────────────────┤
//! │                                                           │
//! │  ┌────────────────┐        ┌───────────────────────────┐  │
//! │  │ ContainerPool  │───────▶│  PoolState                │  │
//! │  │  - acquire()   │  take  │  (idle / unhealthy /      │  │
//! │  │  - release()   │        │   provisioning handles)   │  │
//! │  │  - shutdown()  │        └───────────────────────────┘  │
//! │  └────────────────┘                    ▲ insert / evict   │
//! │          │ cold path                   │                  │
//! │          │             ┌───────────────────────────────┐  │
//! │          │             │  Maintenance task             │  │
//! │          │             │  evict unhealthy, fill        │  │
//! │          │             │  deficit (sequential batch)   │  │
//! │          │             └───────────────────────────────┘  │
//! │          │                    │ gated by                  │
//! │          │             ┌───────────────────────────────┐  │
//! │          │             │  BackoffController            │  │
//! │          │             └───────────────────────────────┘  │
//! │          ▼                    ▼                           │
//! │  ┌─────────────────────────────────────────────────────┐  │
//! │  │  EngineAdapter (create / destroy / health / rename) │  │
//! │  └─────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use warmbox_core::{ContainerPool, PoolConfig, SandboxSpec, SessionSpec};
//! use std::sync::Arc;
//!
//! # async fn example(engine: Arc<dyn warmbox_core::EngineAdapter>) -> warmbox_core::Result<()> {
//! let config = PoolConfig {
//!     target_size: 3,
//!     template: SandboxSpec {
//!         image: "agent-runtime:latest".into(),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//!
//! let mut pool = ContainerPool::new(config, engine);
//! pool.start();
//!
//! // Near-instant when the pool is warm: just an engine rename.
//! let handle = pool.acquire(SessionSpec::new("session-1")).await?;
//!
//! // Sessions never return sandboxes to the pool; release destroys.
//! pool.release(&"session-1".into()).await?;
//!
//! pool.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - No two concurrent `acquire` calls ever receive the same handle.
//! - No lock is held across an engine call; a slow `create` never blocks a
//!   concurrent `acquire`.
//! - Pool filling is strictly sequential within a cycle, bounded by
//!   `batch_limit`, and stops on the first creation failure; after any
//!   failure, proactive provisioning pauses for the backoff window.
//! - Every engine call is deadline-bound; a `create` that outlives its
//!   deadline is treated as failed and its late result is reaped, not
//!   leaked.

mod backoff;
mod config;
mod engine;
mod error;
mod handle;
mod pool;
mod state;

pub use config::{PoolConfig, SandboxSpec};
pub use engine::{EngineAdapter, EngineContainer, Health};
pub use error::{EngineError, PoolError, Result};
pub use handle::{ContainerHandle, HandleState, PoolId, SessionId, SessionSpec};
pub use pool::{ContainerPool, PoolStats};
pub use state::PoolCounts;
