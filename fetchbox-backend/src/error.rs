//! Configuration errors.

use thiserror::Error;

/// Error returned when a cache policy cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid YAML or does not describe a policy.
    #[error("invalid cache policy: {0}")]
    Parse(String),
}
