use std::{io, result::Result as StdResult};

use thiserror::Error;

/// Result alias for focusd commands.
pub type Result<T> = StdResult<T, Error>;

/// Errors that end a focusd command with a non-zero exit status.
#[derive(Debug, Error)]
pub enum Error {
    /// Pipeline or configuration failure.
    #[error(transparent)]
    Pipeline(#[from] focus_pipeline::Error),

    /// The observation service refused to start.
    #[error("focus observation could not be started")]
    StartFailed,

    /// No tab URL could be resolved for the application.
    #[error("no active tab URL for {0}")]
    Unresolved(String),

    /// Writing an event failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Waiting for the interrupt signal failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
