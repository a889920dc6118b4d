//! Error types for configuration loading.
//!
//! Runtime faults (bad lines, unwritable totals file) are logged and
//! recovered in place; only configuration problems surface as errors,
//! because they are fatal at startup.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration load/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Sensor table key is not a numeric field index
    #[error("invalid sensor key {0:?}: sensor keys must be numeric field indices")]
    InvalidSensorKey(String),

    /// Sensor table is empty
    #[error("no sensors configured")]
    NoSensors,
}
