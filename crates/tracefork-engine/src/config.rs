//! Engine configuration
//!
//! Layered lowest to highest: defaults, optional TOML file, environment.

use crate::error::EngineError;
use crate::flags::FeatureFlags;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracefork_core::{DEFAULT_COMPARE_SUBTREE_LIMIT, DEFAULT_FORK_SUBTREE_LIMIT};

pub const ENV_DISABLE_COMPARE: &str = "TRACEFORK_DISABLE_COMPARE";
pub const ENV_DISABLE_FORK: &str = "TRACEFORK_DISABLE_FORK";
pub const ENV_MAX_TRACES: &str = "TRACEFORK_MAX_TRACES";
pub const ENV_BOOTSTRAP_ADMIN: &str = "TRACEFORK_BOOTSTRAP_ADMIN_USER_ID";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Max nodes in a committed fork subtree
    pub fork_subtree_limit: usize,
    /// Max nodes in a synchronous comparison
    pub compare_subtree_limit: usize,
    /// Delay before the deferred run step starts
    pub run_delay_ms: u64,
    /// Execution store capacity
    pub max_traces: usize,
    /// Project assigned when none is known
    pub default_project_id: String,
    /// User id allowed to bypass project scoping
    pub bootstrap_admin_user_id: Option<String>,
    /// Initial feature flags
    pub flags: FeatureFlags,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fork_subtree_limit: DEFAULT_FORK_SUBTREE_LIMIT,
            compare_subtree_limit: DEFAULT_COMPARE_SUBTREE_LIMIT,
            run_delay_ms: 120,
            max_traces: 200,
            default_project_id: "project-default".to_string(),
            bootstrap_admin_user_id: None,
            flags: FeatureFlags::default(),
        }
    }
}

impl EngineConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_fork_subtree_limit(mut self, limit: usize) -> Self {
        self.fork_subtree_limit = limit;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_compare_subtree_limit(mut self, limit: usize) -> Self {
        self.compare_subtree_limit = limit;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_run_delay_ms(mut self, delay_ms: u64) -> Self {
        self.run_delay_ms = delay_ms;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_traces(mut self, max: usize) -> Self {
        self.max_traces = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_default_project(mut self, project_id: impl Into<String>) -> Self {
        self.default_project_id = project_id.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_bootstrap_admin(mut self, user_id: impl Into<String>) -> Self {
        self.bootstrap_admin_user_id = Some(user_id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_flags(mut self, flags: FeatureFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    #[must_use]
    pub fn run_delay(&self) -> Duration {
        Duration::from_millis(self.run_delay_ms)
    }

    /// Parse a TOML document; missing keys keep their defaults
    ///
    /// # Errors
    /// `EngineError::Config` on malformed TOML
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Load from an optional TOML file, then overlay the process environment
    ///
    /// # Errors
    /// `EngineError::Config` if the file cannot be read or parsed
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let base = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    EngineError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        Ok(base.apply_env_with(|key| std::env::var(key).ok()))
    }

    /// Overlay environment overrides read through `lookup`
    ///
    /// Malformed values are ignored.
    #[must_use]
    pub fn apply_env_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup(ENV_DISABLE_COMPARE).is_some_and(|v| v.trim() == "1") {
            self.flags.compare_disabled = true;
        }
        if lookup(ENV_DISABLE_FORK).is_some_and(|v| v.trim() == "1") {
            self.flags.fork_disabled = true;
        }
        if let Some(raw) = lookup(ENV_MAX_TRACES) {
            match raw.trim().parse::<usize>() {
                Ok(max) if max > 0 => self.max_traces = max,
                _ => tracing::warn!(value = %raw, "ignoring malformed {ENV_MAX_TRACES}"),
            }
        }
        if let Some(user) = lookup(ENV_BOOTSTRAP_ADMIN) {
            let user = user.trim();
            if !user.is_empty() {
                self.bootstrap_admin_user_id = Some(user.to_string());
            }
        }
        self
    }
}
