//! Runtime feature flags

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Kill switches for the comparison and fork paths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub compare_disabled: bool,
    pub fork_disabled: bool,
}

impl FeatureFlags {
    #[inline]
    #[must_use]
    pub fn with_compare_disabled(mut self, disabled: bool) -> Self {
        self.compare_disabled = disabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_fork_disabled(mut self, disabled: bool) -> Self {
        self.fork_disabled = disabled;
        self
    }
}

/// Partial flag update; unset fields keep their value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_disabled: Option<bool>,
}

impl FlagUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compare_disabled.is_none() && self.fork_disabled.is_none()
    }
}

/// Source of the current flag values
pub trait FeatureFlagSource: Send + Sync {
    fn flags(&self) -> FeatureFlags;

    /// Apply `update` and return the resulting flags
    fn update(&self, update: FlagUpdate) -> FeatureFlags;
}

#[derive(Debug, Default)]
pub struct InMemoryFeatureFlags {
    current: RwLock<FeatureFlags>,
}

impl InMemoryFeatureFlags {
    #[must_use]
    pub fn new(initial: FeatureFlags) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }
}

impl FeatureFlagSource for InMemoryFeatureFlags {
    fn flags(&self) -> FeatureFlags {
        *self.current.read()
    }

    fn update(&self, update: FlagUpdate) -> FeatureFlags {
        let mut current = self.current.write();
        if let Some(disabled) = update.compare_disabled {
            current.compare_disabled = disabled;
        }
        if let Some(disabled) = update.fork_disabled {
            current.fork_disabled = disabled;
        }
        tracing::info!(
            compare_disabled = current.compare_disabled,
            fork_disabled = current.fork_disabled,
            "feature flags updated"
        );
        *current
    }
}
