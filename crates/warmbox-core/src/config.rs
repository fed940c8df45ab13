//! Pool and sandbox configuration types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for the container pool.
///
/// Owned by an external config loader; the pool consumes it as-is.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of idle sandboxes to keep ready.
    ///
    /// 0 disables pooling entirely: acquisition always provisions on demand.
    /// Default: 3
    pub target_size: usize,

    /// Interval between maintenance cycles.
    ///
    /// Default: 30 seconds
    pub maintenance_interval: Duration,

    /// Minimum time after a creation failure before proactive provisioning
    /// resumes.
    ///
    /// Default: 5 minutes
    pub backoff_window: Duration,

    /// Maximum number of creation attempts within one maintenance cycle.
    ///
    /// Bounds burst resource usage regardless of target size.
    /// Default: 3
    pub batch_limit: usize,

    /// Deadline for a single engine `create` call.
    ///
    /// Default: 60 seconds
    pub create_timeout: Duration,

    /// Consecutive creation failures after which on-demand provisioning
    /// quick-fails instead of calling the engine.
    ///
    /// Default: 3
    pub quick_fail_threshold: u32,

    /// Prefix for engine-side sandbox names.
    ///
    /// Pooled sandboxes are named `{prefix}-pool-{poolId}` and renamed to
    /// `{prefix}-{sessionId}` at assignment. Default: "warmbox"
    pub name_prefix: String,

    /// Sandbox template used for every pool creation.
    pub template: SandboxSpec,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            target_size: 3,
            maintenance_interval: Duration::from_secs(30),
            backoff_window: Duration::from_secs(300),
            batch_limit: 3,
            create_timeout: Duration::from_secs(60),
            quick_fail_threshold: 3,
            name_prefix: "warmbox".to_string(),
            template: SandboxSpec::default(),
        }
    }
}

/// Template for provisioning one sandbox, handed to the engine adapter.
///
/// The pool fills in `name` per creation; everything else comes from the
/// configured template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandboxSpec {
    /// Image the sandbox is provisioned from (assumed pre-available).
    pub image: String,
    /// External name for the sandbox instance.
    #[serde(default)]
    pub name: String,
    /// Environment variables injected into the sandbox.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl SandboxSpec {
    /// Clone this spec with a different instance name.
    pub(crate) fn named(&self, name: impl Into<String>) -> Self {
        let mut spec = self.clone();
        spec.name = name.into();
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.target_size, 3);
        assert_eq!(config.maintenance_interval, Duration::from_secs(30));
        assert_eq!(config.backoff_window, Duration::from_secs(300));
        assert_eq!(config.batch_limit, 3);
        assert_eq!(config.create_timeout, Duration::from_secs(60));
        assert_eq!(config.quick_fail_threshold, 3);
    }

    #[test]
    fn test_spec_named_keeps_template() {
        let mut template = SandboxSpec {
            image: "agent-runtime:latest".to_string(),
            ..Default::default()
        };
        template.env.insert("LANG".to_string(), "C.UTF-8".to_string());

        let spec = template.named("warmbox-pool-1");
        assert_eq!(spec.name, "warmbox-pool-1");
        assert_eq!(spec.image, "agent-runtime:latest");
        assert_eq!(spec.env.get("LANG").map(String::as_str), Some("C.UTF-8"));
        assert_eq!(template.name, "");
    }
}
