//! Configuration for the enforcement engine.

use crate::cache::CacheConfig;

/// Default limit on role inheritance depth.
pub const DEFAULT_MAX_ROLE_DEPTH: usize = 10;

/// Configuration applied to every compiled enforcer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcerConfig {
    /// Maximum number of inheritance hops followed when resolving roles.
    /// Roles further away are ignored.
    pub max_role_depth: usize,
    /// Decision cache configuration.
    pub cache_config: CacheConfig,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            max_role_depth: DEFAULT_MAX_ROLE_DEPTH,
            cache_config: CacheConfig::default(),
        }
    }
}

impl EnforcerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum role inheritance depth.
    pub fn with_max_role_depth(mut self, depth: usize) -> Self {
        self.max_role_depth = depth;
        self
    }

    /// Set the cache configuration.
    pub fn with_cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Configuration without decision caching, useful in tests.
    pub fn uncached() -> Self {
        Self::default().with_cache_config(CacheConfig::disabled())
    }
}
