//! Errors raised while loading resort data or interpreting a user request.
//! Failing to find a route is not an error, see
//! [`crate::routing::diagnostics`] for how that outcome is reported.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No dataset exists for the requested ski area
    #[error("unknown ski area: {id}")]
    UnknownSkiArea { id: String },

    /// A JSON dataset could not be read from disk
    #[error("failed to read dataset at {path}: {source}")]
    DatasetRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A JSON dataset was read but could not be parsed
    #[error("failed to parse dataset at {path}: {source}")]
    DatasetParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A value in the user's request could not be interpreted
    #[error("invalid value for {field}: '{value}'")]
    InvalidRequest { field: &'static str, value: String },

    /// An environment variable was set to a value which could not be used
    #[error("environment variable {var} has invalid value '{value}'")]
    InvalidConfig { var: &'static str, value: String },

    /// The shared graph cache lock was poisoned by a panicking request
    #[error("graph cache is unavailable")]
    CacheUnavailable,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
