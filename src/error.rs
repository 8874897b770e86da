use std::path::PathBuf;

use thiserror::Error;

use crate::ids::HostId;

/// Errors surfaced while loading or watching the JSON configuration file.
///
/// [`crate::config::ConfigurationManager`] logs every variant and keeps
/// serving the previous configuration view on reload, with one exception:
/// `MissingKey` is treated as fatal, since a configuration missing a
/// required top-level section can't be trusted to describe the same schema
/// the rest of the process assumes.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration file {path} has an unsupported content type: {mime}")]
    UnsupportedMime { path: PathBuf, mime: String },

    #[error("failed to parse configuration {path} as JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration is missing required key `{0}`")]
    MissingKey(String),

    #[error("configuration key `{key}` must be a positive integer, got {value}")]
    InvalidValue { key: String, value: i64 },

    #[error("failed to watch directory {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors raised while processing a sample batch or reconfiguration.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// A host's first observed sample was missing the required `Activity`
    /// metric. This is a fatal configuration error — the caller is expected
    /// to log and terminate the process rather than try to recover.
    #[error("host {0} reported its first sample without the required `Activity` metric")]
    MissingActivityMetric(HostId),
}

pub type Result<T> = std::result::Result<T, SentinelError>;
