//! Declarative cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CacheSlot, ConfigError, DEFAULT_TTL, MapCache, TtlCache, global_cache};

/// TTL backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TtlConfig {
    /// Entry lifetime (e.g. "30m", "90s", "500ms").
    #[serde(default = "default_ttl", with = "humantime_serde")]
    pub ttl: Duration,
}

fn default_ttl() -> Duration {
    DEFAULT_TTL
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

/// Which cache a context uses.
///
/// ```yaml
/// # the process-wide shared map
/// Global
/// ```
///
/// ```yaml
/// Ttl:
///   ttl: 10m
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
pub enum CachePolicy {
    /// No caching.
    Disabled,
    /// The shared [`global_cache`].
    #[default]
    Global,
    /// A private [`MapCache`].
    Memory,
    /// A private [`TtlCache`].
    Ttl(TtlConfig),
}

impl CachePolicy {
    /// Parses a policy from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_saphyr::from_str(yaml).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Builds the slot this policy describes.
    ///
    /// `Memory` and `Ttl` create a new cache on every call.
    pub fn build(&self) -> CacheSlot {
        match self {
            CachePolicy::Disabled => CacheSlot::Disabled,
            CachePolicy::Global => CacheSlot::Enabled(global_cache()),
            CachePolicy::Memory => CacheSlot::enabled(MapCache::new()),
            CachePolicy::Ttl(config) => CacheSlot::enabled(TtlCache::with_ttl(config.ttl)),
        }
    }
}
