use std::{io, path::PathBuf, result::Result as StdResult};

use thiserror::Error;
use tokio::runtime::TryCurrentError;

/// Convenient result type for the pipeline crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the focus pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Errors originating from the native source adapter.
    #[error("Focus source error: {0}")]
    Source(#[from] focus_watcher::Error),

    /// Configuration could not be read or parsed.
    #[error("Config error at {}: {message}", .path.display())]
    Config {
        /// File the configuration was read from.
        path: PathBuf,
        /// Human-readable cause.
        message: String,
    },

    /// I/O failure while performing a system operation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No Tokio runtime was available to spawn background work.
    #[error("No Tokio runtime: {0}")]
    Runtime(#[from] TryCurrentError),

    /// Configuration could not be rendered.
    #[error("Config encode error: {0}")]
    Encode(String),

    /// A processing step reported failure.
    #[error("Processing error: {0}")]
    Process(String),
}
